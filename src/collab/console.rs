// src/collab/console.rs
//! The console device backing stdin/stdout (fd 0 and fd 1) and the process
//! termination message (§4.5), plus this crate's own `debug_print!`
//! plumbing ([`crate::logging`]) — Pintos's `putbuf`/`printf` both target
//! the same serial console, so this crate keeps a single sink rather than
//! separate ones for syscalls and logging.
//!
//! Grounded in the teacher's `static SERIAL1: Mutex<SerialPort>` global in
//! `kernel/src/kernel/driver/serial.rs`, generalized from that file's
//! concrete `SerialPort` struct to a trait object here, since this crate
//! has no fixed serial-port hardware to assume and needs the embedding
//! kernel to supply whatever console it has.

use spin::Mutex;

/// A byte-oriented console. `write_str` backs `sys_write(1, ...)` and the
/// `debug_print!` macros; `read_byte` backs `sys_read(0, ...)`.
pub trait ConsoleSink: Sync {
    /// Write `s` to the console. Never fails from this crate's point of
    /// view — a disconnected console is the embedding kernel's problem.
    fn write_str(&self, s: &str);

    /// Write a raw byte burst to the console — `sys_write(1, ...)` hands
    /// over whatever bytes the user buffer held, valid UTF-8 or not.
    /// Default impl degrades to [`ConsoleSink::write_str`], dropping
    /// non-UTF-8 input; a real serial/VGA sink should override this to be
    /// byte-faithful.
    fn write_bytes(&self, bytes: &[u8]) {
        if let Ok(s) = core::str::from_utf8(bytes) {
            self.write_str(s);
        }
    }

    /// Read one byte from the console's input stream, blocking if none is
    /// available yet. `None` signals end-of-input.
    fn read_byte(&self) -> Option<u8> {
        None
    }
}

struct NullConsole;

impl ConsoleSink for NullConsole {
    fn write_str(&self, _s: &str) {}
}

static CONSOLE: Mutex<&'static dyn ConsoleSink> = Mutex::new(&NullConsole);

/// Install the console the embedding kernel wants stdin/stdout and log
/// output routed to. Until this is called, both are silently discarded /
/// report end-of-input.
pub fn install(sink: &'static dyn ConsoleSink) {
    *CONSOLE.lock() = sink;
}

/// The currently installed console sink.
#[must_use]
pub fn current() -> &'static dyn ConsoleSink {
    *CONSOLE.lock()
}
