// src/logging.rs
//! Console/debug output plumbing.
//!
//! This crate has no serial port or VGA buffer of its own — the embedding
//! kernel supplies one via [`crate::collab::console::install`]. These
//! macros mirror the teacher kernel's `debug_print!`/`debug_println!` shape
//! (a bespoke macro over the real device, rather than the `log` crate
//! facade), and write through the same console sink that backs stdin/stdout
//! syscalls, matching Pintos's single shared console.

use core::fmt::Write;

use crate::collab::console::ConsoleSink;

#[doc(hidden)]
pub fn _write_fmt(args: core::fmt::Arguments<'_>) {
    struct SinkWriter<'a>(&'a dyn ConsoleSink);
    impl Write for SinkWriter<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.0.write_str(s);
            Ok(())
        }
    }
    let _ = SinkWriter(crate::collab::console::current()).write_fmt(args);
}

/// Write formatted text to the console sink, no trailing newline.
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {
        $crate::logging::_write_fmt(format_args!($($arg)*))
    };
}

/// Write formatted text to the console sink, with a trailing newline.
#[macro_export]
macro_rules! debug_println {
    () => ($crate::debug_print!("\n"));
    ($($arg:tt)*) => ($crate::debug_print!("{}\n", format_args!($($arg)*)));
}
