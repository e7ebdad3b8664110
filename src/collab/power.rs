// src/collab/power.rs
//! Machine power control, backing `SYS_HALT`.
//!
//! Grounded in Pintos's `shutdown_power_off`: a single call that never
//! returns. Modeled the same way as every other external capability in
//! this module — a trait plus a process-wide singleton — rather than as a
//! bare `fn() -> !` pointer, so the embedding kernel installs it the same
//! way it installs the scheduler or the console.

use spin::Mutex;

/// Powers the whole machine off. Distinct from
/// [`super::scheduler::Scheduler::exit_current`], which only ends the
/// calling thread.
pub trait PowerControl: Send + Sync {
    /// Shut the machine down. Never returns.
    fn halt(&self) -> !;
}

static POWER: Mutex<Option<&'static dyn PowerControl>> = Mutex::new(None);

/// Install the process-wide power control.
pub fn install(control: &'static dyn PowerControl) {
    *POWER.lock() = Some(control);
}

/// The installed power control. Panics if none has been installed.
#[must_use]
pub fn current() -> &'static dyn PowerControl {
    POWER.lock().expect("power control not installed")
}
