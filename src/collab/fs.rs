// src/collab/fs.rs
//! File system contract backing the open-file table (§4.2) and the ELF
//! loader's `filesys_open` calls.
//!
//! Grounded in `kernel/fs/mod.rs` of the teacher crate (`FileResult<T>`,
//! `FileError`, a `FileDescriptor` trait), generalized from the teacher's
//! block-device-backed file system to a trait object so this crate never
//! depends on a concrete FS implementation. The spec's single global
//! file-system lock (every syscall except the trivial ones takes it for
//! the whole call) mirrors Pintos's own `filesys_lock`, kept here as a
//! `lazy_static!` global the same way the teacher keeps its boot-info
//! allocator global.

use alloc::boxed::Box;
use lazy_static::lazy_static;
use spin::Mutex;

/// An open file, or a directory entry's backing store for `filesize`/
/// `read`/`write`/`seek`/`tell`/`close`.
pub trait FileHandle: Send {
    /// Length of the file in bytes (`file_length`).
    fn length(&self) -> u32;

    /// Read up to `buf.len()` bytes starting at the handle's current
    /// position, advancing it by the amount read. Returns the number of
    /// bytes actually read (0 at end-of-file).
    fn read(&mut self, buf: &mut [u8]) -> u32;

    /// Write `buf.len()` bytes at the handle's current position, advancing
    /// it. Returns the number of bytes actually written (may be short if
    /// the underlying store is full).
    fn write(&mut self, buf: &[u8]) -> u32;

    /// Move the handle's current position to `position` bytes from the
    /// start of the file (`file_seek`). Seeking past the end is legal; a
    /// subsequent read returns 0 and a subsequent write extends the file.
    fn seek(&mut self, position: u32);

    /// The handle's current position in bytes from the start of the file
    /// (`file_tell`).
    fn tell(&self) -> u32;
}

/// The backing file system: opens, creates, removes, and executes files by
/// name.
pub trait FileSystem: Send {
    /// Create a new, empty file named `name` with an initial size of
    /// `initial_size` bytes. `false` if a file with that name already
    /// exists or the store is full (`filesys_create`).
    fn create(&mut self, name: &str, initial_size: u32) -> bool;

    /// Remove the file named `name`. Pintos allows removing a file that is
    /// still open; the handle stays valid until closed (`filesys_remove`).
    fn remove(&mut self, name: &str) -> bool;

    /// Open the file named `name` for the open-file table, or for the ELF
    /// loader to read an executable. `None` if no such file exists
    /// (`filesys_open`).
    fn open(&mut self, name: &str) -> Option<Box<dyn FileHandle>>;

    /// Deny writes to the file named `name` for as long as `count` says a
    /// caller holds it open for execution (`file_deny_write`, called on a
    /// running executable's own image). Implementations that don't model
    /// write-denial may no-op.
    fn deny_write(&mut self, name: &str) {
        let _ = name;
    }

    /// Reverse a prior `deny_write` (`file_allow_write`, called on process
    /// exit).
    fn allow_write(&mut self, name: &str) {
        let _ = name;
    }
}

lazy_static! {
    static ref FILE_SYSTEM: Mutex<Option<Box<dyn FileSystem>>> = Mutex::new(None);
}

/// Install the file system every syscall handler and the ELF loader open
/// files against. Must be called once before any process is started.
pub fn install_file_system(fs: Box<dyn FileSystem>) {
    *FILE_SYSTEM.lock() = Some(fs);
}

/// Run `f` with the installed file system, holding the single global lock
/// for the whole call — mirrors Pintos's "acquire `filesys_lock` for the
/// duration of every filesystem-touching syscall" rule. Panics if no file
/// system has been installed.
pub fn with_file_system<R>(f: impl FnOnce(&mut dyn FileSystem) -> R) -> R {
    let mut guard = FILE_SYSTEM.lock();
    let fs = guard.as_deref_mut().expect("file system not installed");
    f(fs)
}
