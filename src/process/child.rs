// src/process/child.rs
//! The parent-owned hand-off slot that carries a child's exit status and
//! rendezvous semaphore (§3's ChildRecord).
//!
//! Grounded in `struct child_proc` of
//! `original_source/src/userprog/process.c`. That C struct is reached from
//! two directions at once (the parent's list, and a raw `void **ref` back
//! into the child thread) with manual pointer-nulling to keep the two
//! sides from racing past each other's teardown. This crate instead shares
//! one heap allocation via `Arc` between the parent's children list and the
//! child's own handle to it: "detaching" is just dropping one side's `Arc`,
//! and the at-most-once signal invariant is enforced directly rather than
//! inferred from pointer liveness.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::collab::scheduler::ThreadId;
use crate::collab::sync::Semaphore;
use crate::config::{INITIAL_EXIT_STATUS, TID_ERROR};
use spin::Mutex;

/// A parent's hand-off slot for one spawned child. Exactly one exists per
/// (parent, spawned-child) pair, lives on storage the parent keeps alive
/// via its `Arc`, and is signalled at most once.
pub struct ChildRecord {
    /// Set once `spawn` learns the scheduler's assigned id; `TID_ERROR`
    /// until then.
    tid: Mutex<ThreadId>,
    status: Mutex<i32>,
    signaled: AtomicBool,
    semaphore: alloc::boxed::Box<dyn Semaphore>,
}

impl ChildRecord {
    /// Create a fresh record for a child about to be spawned, status
    /// initialised to -1 and its semaphore to 0. The tid isn't known until
    /// the scheduler hands one back — see [`ChildRecord::set_tid`].
    #[must_use]
    pub fn new(semaphore: alloc::boxed::Box<dyn Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            tid: Mutex::new(TID_ERROR),
            status: Mutex::new(INITIAL_EXIT_STATUS),
            signaled: AtomicBool::new(false),
            semaphore,
        })
    }

    #[must_use]
    pub fn tid(&self) -> ThreadId {
        *self.tid.lock()
    }

    /// Record the scheduler-assigned thread id, once `spawn` learns it.
    pub fn set_tid(&self, tid: ThreadId) {
        *self.tid.lock() = tid;
    }

    /// The status last written by `set_status_and_signal`, or -1 if the
    /// child hasn't exited yet (or was kernel-terminated before calling
    /// `exit`).
    #[must_use]
    pub fn status(&self) -> i32 {
        *self.status.lock()
    }

    /// Record `status` and wake whoever is (or later will be) waiting on
    /// this record. Called exactly once in the lifetime of the record, by
    /// the child's own `process_exit`.
    pub fn set_status_and_signal(&self, status: i32) {
        *self.status.lock() = status;
        let already_signaled = self.signaled.swap(true, Ordering::AcqRel);
        debug_assert!(!already_signaled, "ChildRecord signalled more than once");
        self.semaphore.up();
    }

    /// Block until the child signals, then return its status. Used by
    /// `wait` (blocks until exit) and by `spawn` (blocks until bootstrap
    /// reports success or failure) — the two use distinct records, but
    /// both rendezvous the same way.
    pub fn wait(&self) -> i32 {
        self.semaphore.down();
        self.status()
    }
}
