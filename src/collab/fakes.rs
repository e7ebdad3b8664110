// src/collab/fakes.rs
//! In-memory collaborator fakes backing the unit tests in `elf`, `args`,
//! `process`, and `syscall`. Grounded in the `#[cfg(all(test, feature =
//! "std-tests"))] mod tests` helpers of `memory/access.rs` in the teacher
//! crate, which builds a trivial in-memory stand-in rather than mocking a
//! real device.
//!
//! These are deliberately simple: single-threaded, synchronous, and backed
//! by `BTreeMap`/`Vec` rather than anything resembling real hardware.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;

use super::console::ConsoleSink;
use super::fs::{FileHandle, FileSystem};
use super::paging::{PageAllocator, PageDirectory, PageDirectoryFactory, PhysPage, UserAddr};
use super::power::PowerControl;
use super::scheduler::{Priority, Scheduler, ThreadId};
use super::sync::{Semaphore, SemaphoreFactory};

/// A bump allocator over a fixed-size pool of fake frames. Good enough to
/// exhaust (`alloc_page` returning `None`) for out-of-memory test cases.
pub struct FakePageAllocator {
    next: u32,
    limit: u32,
}

impl FakePageAllocator {
    #[must_use]
    pub fn new(frame_count: u32) -> Self {
        Self { next: 0, limit: frame_count }
    }
}

impl PageAllocator for FakePageAllocator {
    fn alloc_page(&mut self, _zeroed: bool) -> Option<PhysPage> {
        if self.next >= self.limit {
            return None;
        }
        let frame = PhysPage(self.next);
        self.next += 1;
        Some(frame)
    }

    fn free_page(&mut self, _page: PhysPage) {}
}

/// A page directory backed by a map from user page to (frame, writable).
/// `read_user`/`write_user` walk this map a byte at a time rather than
/// modeling real page-table hardware, which is adequate for exercising the
/// loader and the address validators.
#[derive(Default)]
pub struct FakePageDirectory {
    pages: BTreeMap<u32, (PhysPage, bool)>,
    backing: BTreeMap<u32, Vec<u8>>,
}

impl FakePageDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageDirectory for FakePageDirectory {
    fn activate(&mut self) {}

    fn map(&mut self, upage: UserAddr, frame: PhysPage, writable: bool) -> bool {
        let base = upage.page_base().0;
        if self.pages.contains_key(&base) {
            return false;
        }
        self.pages.insert(base, (frame, writable));
        self.backing.insert(base, alloc::vec![0u8; crate::config::PGSIZE]);
        true
    }

    fn unmap(&mut self, upage: UserAddr) -> Option<PhysPage> {
        let base = upage.page_base().0;
        self.backing.remove(&base);
        self.pages.remove(&base).map(|(frame, _)| frame)
    }

    fn lookup(&self, upage: UserAddr) -> Option<PhysPage> {
        self.pages.get(&upage.page_base().0).map(|(frame, _)| *frame)
    }

    fn is_writable(&self, upage: UserAddr) -> bool {
        self.pages.get(&upage.page_base().0).is_some_and(|(_, w)| *w)
    }

    fn set_writable(&mut self, upage: UserAddr, writable: bool) {
        if let Some(entry) = self.pages.get_mut(&upage.page_base().0) {
            entry.1 = writable;
        }
    }

    fn read_user(&self, addr: UserAddr, out: &mut [u8]) -> bool {
        let mut cursor = addr.0;
        for byte in out.iter_mut() {
            let base = UserAddr(cursor).page_base().0;
            let Some(page) = self.backing.get(&base) else { return false };
            *byte = page[(cursor - base) as usize];
            cursor += 1;
        }
        true
    }

    fn write_user(&mut self, addr: UserAddr, data: &[u8]) -> bool {
        let mut cursor = addr.0;
        for byte in data {
            let base = UserAddr(cursor).page_base().0;
            let Some(page) = self.backing.get_mut(&base) else { return false };
            page[(cursor - base) as usize] = *byte;
            cursor += 1;
        }
        true
    }
}

pub struct FakePageDirectoryFactory;

impl PageDirectoryFactory for FakePageDirectoryFactory {
    fn create(&self) -> Option<Box<dyn PageDirectory>> {
        Some(Box::new(FakePageDirectory::new()))
    }

    fn destroy(&self, _directory: Box<dyn PageDirectory>) {}
}

/// Runs every "spawned" thread synchronously, inline, before `spawn`
/// returns. This is a documented limitation: it cannot exercise real
/// concurrency, only the bootstrap-success/bootstrap-failure outcomes the
/// lifecycle tests care about.
pub struct FakeScheduler {
    next_tid: Mutex<ThreadId>,
}

impl FakeScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self { next_tid: Mutex::new(1) }
    }
}

impl Default for FakeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for FakeScheduler {
    fn current(&self) -> ThreadId {
        0
    }

    fn spawn(&self, _name: &str, _priority: Priority, entry: Box<dyn FnOnce() + Send>) -> Option<ThreadId> {
        let mut guard = self.next_tid.lock();
        let tid = *guard;
        *guard += 1;
        drop(guard);
        entry();
        Some(tid)
    }

    fn exit_current(&self) -> ! {
        panic!("FakeScheduler::exit_current called outside a real thread");
    }
}

/// A semaphore that is always already satisfied. Valid only because
/// [`FakeScheduler::spawn`] runs its entry function to completion before
/// returning, so by the time test code calls `down`, the "child" has
/// already finished and `up` has already been called.
pub struct FakeSemaphore {
    count: Mutex<u32>,
}

impl Semaphore for FakeSemaphore {
    fn down(&self) {
        let mut guard = self.count.lock();
        assert!(*guard > 0, "FakeSemaphore::down called while count is 0 (would deadlock)");
        *guard -= 1;
    }

    fn up(&self) {
        *self.count.lock() += 1;
    }
}

pub struct FakeSemaphoreFactory;

impl SemaphoreFactory for FakeSemaphoreFactory {
    fn create(&self, value: u32) -> Box<dyn Semaphore> {
        Box::new(FakeSemaphore { count: Mutex::new(value) })
    }
}

/// An in-memory file, backed by a growable byte buffer.
#[derive(Default)]
struct FakeFile {
    data: Vec<u8>,
    pos: u32,
}

impl FileHandle for FakeFile {
    fn length(&self) -> u32 {
        self.data.len() as u32
    }

    fn read(&mut self, buf: &mut [u8]) -> u32 {
        let start = self.pos as usize;
        if start >= self.data.len() {
            return 0;
        }
        let end = (start + buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        self.pos += n as u32;
        n as u32
    }

    fn write(&mut self, buf: &[u8]) -> u32 {
        let start = self.pos as usize;
        if start + buf.len() > self.data.len() {
            self.data.resize(start + buf.len(), 0);
        }
        self.data[start..start + buf.len()].copy_from_slice(buf);
        self.pos += buf.len() as u32;
        buf.len() as u32
    }

    fn seek(&mut self, position: u32) {
        self.pos = position;
    }

    fn tell(&self) -> u32 {
        self.pos
    }
}

/// An in-memory file system over a name-to-bytes map. `open` hands out a
/// fresh [`FakeFile`] seeded with a copy of the stored bytes; writes
/// through that handle do not propagate back (adequate for read-path
/// tests; lifecycle tests that need write-back use
/// [`FakeFileSystem::contents`] to inspect what would be written instead).
#[derive(Default)]
pub struct FakeFileSystem {
    files: BTreeMap<String, Vec<u8>>,
}

impl FakeFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file directly, bypassing `create`, useful for loading a
    /// fake executable image.
    pub fn seed(&mut self, name: &str, data: Vec<u8>) {
        self.files.insert(String::from(name), data);
    }
}

impl FileSystem for FakeFileSystem {
    fn create(&mut self, name: &str, initial_size: u32) -> bool {
        if self.files.contains_key(name) {
            return false;
        }
        self.files.insert(String::from(name), alloc::vec![0u8; initial_size as usize]);
        true
    }

    fn remove(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    fn open(&mut self, name: &str) -> Option<Box<dyn FileHandle>> {
        let data = self.files.get(name)?.clone();
        Some(Box::new(FakeFile { data, pos: 0 }))
    }
}

/// A console that records every write and serves queued input bytes.
#[derive(Default)]
pub struct FakeConsole {
    written: Mutex<Vec<u8>>,
    input: Mutex<Vec<u8>>,
}

impl FakeConsole {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent `read_byte` calls, in order.
    pub fn queue_input(&self, bytes: &[u8]) {
        self.input.lock().extend_from_slice(bytes);
    }

    /// Everything written so far, as raw bytes.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

impl ConsoleSink for FakeConsole {
    fn write_str(&self, s: &str) {
        self.written.lock().extend_from_slice(s.as_bytes());
    }

    fn write_bytes(&self, bytes: &[u8]) {
        self.written.lock().extend_from_slice(bytes);
    }

    fn read_byte(&self) -> Option<u8> {
        let mut guard = self.input.lock();
        if guard.is_empty() {
            return None;
        }
        Some(guard.remove(0))
    }
}

/// A power control that records it was called, via a panic message tests
/// can match on — there is no "resume after halt" for this call to model.
pub struct FakePowerControl;

impl PowerControl for FakePowerControl {
    fn halt(&self) -> ! {
        panic!("FakePowerControl::halt called");
    }
}
