// src/collab/sync.rs
//! Semaphore contract used for the parent/child rendezvous in
//! [`crate::process::lifecycle`] (`process_wait`/`process_exit` in the
//! original), plus the "wait until the loader finishes or fails" handshake
//! in `exec`.
//!
//! The teacher crate has no blocking primitive of any kind (no semaphore,
//! condvar, or wait queue), so this trait and its factory are this crate's
//! own invention, shaped after Pintos's `struct semaphore`/`sema_init`
//! split: a `ChildRecord` needs to create semaphores on demand rather than
//! borrow a single static one.

use lazy_static::lazy_static;
use spin::Mutex;

/// A counting semaphore, matching Pintos's `struct semaphore`.
pub trait Semaphore: Send + Sync {
    /// Block until the count is positive, then decrement it.
    fn down(&self);

    /// Increment the count, waking one waiter if any are blocked.
    fn up(&self);
}

/// Creates semaphores at a given initial count. A separate trait from
/// [`Semaphore`] for the same reason as [`super::paging::PageDirectoryFactory`]:
/// creation has no `self` of the right type to operate on yet.
pub trait SemaphoreFactory: Send + Sync {
    /// Allocate a new semaphore initialized to `value`.
    fn create(&self, value: u32) -> alloc::boxed::Box<dyn Semaphore>;
}

lazy_static! {
    static ref SEMAPHORE_FACTORY: Mutex<Option<&'static dyn SemaphoreFactory>> = Mutex::new(None);
}

/// Install the process-wide semaphore factory.
pub fn install_semaphore_factory(factory: &'static dyn SemaphoreFactory) {
    *SEMAPHORE_FACTORY.lock() = Some(factory);
}

/// The installed semaphore factory. Panics if none has been installed.
#[must_use]
pub fn current_semaphore_factory() -> &'static dyn SemaphoreFactory {
    SEMAPHORE_FACTORY.lock().expect("semaphore factory not installed")
}
