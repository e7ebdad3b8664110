// src/collab/scheduler.rs
//! Scheduler contract: this crate never owns a thread or a run queue, it
//! only asks the embedding scheduler to spawn one and tells it who's
//! running.
//!
//! The teacher crate's own `trait Scheduler` (`src/kernel/core/traits.rs`)
//! is shaped around a concrete run queue — `schedule`/`switch_to`/
//! `remove_task`/`task_count`/`set_task_state` — and has no `spawn`/
//! `current`/`exit_current` of any kind; this trait's method set is this
//! crate's own design for the very different job of handing work to an
//! external scheduler rather than being one. What is reused from the
//! teacher is the shape of the abstraction itself: a trait object installed
//! as a global collaborator, the same pattern `PageAllocator`/`FileSystem`
//! follow here. Pintos's `thread_create` takes a raw `(entry_fn, aux_ptr)`
//! pair; this crate instead hands the scheduler a `Box<dyn FnOnce() + Send>`
//! bootstrap closure, the idiomatic Rust shape for "run this once,
//! capturing whatever state it needs."

use alloc::boxed::Box;
use lazy_static::lazy_static;
use spin::Mutex;

/// Opaque identifier for a schedulable thread of execution. This is the
/// "Thread (external)" concept from the data model: the scheduler owns the
/// real struct, this crate only ever holds its id.
pub type ThreadId = i32;

/// Scheduling priority, mirroring Pintos's `PRI_MIN..=PRI_MAX` scale.
pub type Priority = u8;

pub const PRI_MIN: Priority = 0;
pub const PRI_DEFAULT: Priority = 31;
pub const PRI_MAX: Priority = 63;

/// Bootstraps and tears down threads of execution on this crate's behalf.
pub trait Scheduler: Send + Sync {
    /// The id of the calling thread.
    fn current(&self) -> ThreadId;

    /// Create a new thread named `name` at `priority`, which runs `entry`
    /// to completion and then exits. Returns the new thread's id, or
    /// `None` if the scheduler could not allocate one (mirrors
    /// `thread_create` returning `TID_ERROR`).
    ///
    /// `entry` is run on the new thread, not the caller — implementations
    /// must not invoke it inline.
    fn spawn(&self, name: &str, priority: Priority, entry: Box<dyn FnOnce() + Send>) -> Option<ThreadId>;

    /// Terminate the calling thread. Never returns.
    fn exit_current(&self) -> !;
}

lazy_static! {
    static ref SCHEDULER: Mutex<Option<&'static dyn Scheduler>> = Mutex::new(None);
}

/// Install the process-wide scheduler. There is exactly one per machine.
pub fn install_scheduler(scheduler: &'static dyn Scheduler) {
    *SCHEDULER.lock() = Some(scheduler);
}

/// The installed scheduler. Panics if none has been installed.
#[must_use]
pub fn current_scheduler() -> &'static dyn Scheduler {
    SCHEDULER.lock().expect("scheduler not installed")
}
