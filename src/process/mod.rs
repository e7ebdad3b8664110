// src/process/mod.rs
//! Process lifecycle (component C5): the crate-owned half of the
//! thread/process split (§9's resolved open question — see `DESIGN.md`).
//!
//! The embedding kernel's own thread struct is expected to hold one of
//! these as a field once a thread becomes a user process (mirroring
//! `struct thread`'s `pagedir`/`files`/`children`/`process` fields in
//! `original_source/src/userprog/process.c`). This crate never allocates
//! or looks up a `Process` by id itself — the caller always has one in
//! hand already, exactly as Pintos's functions always operate on
//! `thread_current()`.

pub mod child;
pub mod lifecycle;

pub use child::ChildRecord;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::collab::fs::FileHandle;
use crate::collab::paging::PageDirectory;
use crate::collab::scheduler::ThreadId;
use crate::file_table::FileTable;

/// A user process's kernel-side state: its address space, its open-file
/// table, the executable it was loaded from, and its lifecycle bookkeeping.
///
/// Deliberately carries no tid of its own — the embedding thread already
/// knows its own id (it's the one running this code), and the only place
/// this crate needs a tid is as a `ChildRecord`'s lookup key, which the
/// parent already has in `children`.
pub struct Process {
    pub name: String,
    pub directory: Box<dyn PageDirectory>,
    pub exec_file: Box<dyn FileHandle>,
    pub files: FileTable,
    pub children: Vec<Arc<ChildRecord>>,
    /// This process's own hand-off slot in its parent's `children`, if it
    /// was itself spawned rather than being the initial process. Non-null
    /// for exactly as long as both this process and its parent are alive.
    pub self_record: Option<Arc<ChildRecord>>,
}

impl Process {
    /// Look up and remove a live child record by tid, for `wait`.
    pub fn take_child(&mut self, tid: ThreadId) -> Option<Arc<ChildRecord>> {
        let index = self.children.iter().position(|record| record.tid() == tid)?;
        Some(self.children.remove(index))
    }
}
