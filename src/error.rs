// src/error.rs
//! Error type for the ELF loader.
//!
//! Never escapes across the syscall ABI boundary — the dispatcher in
//! [`crate::syscall`] collapses it to the externally observable
//! `exit(-1)` / `-1` / `TID_ERROR` the spec mandates. It exists so
//! [`crate::elf`] and [`crate::args`] can report *which* thing went
//! wrong, which is what their unit tests assert on.

use core::fmt;

/// Why the ELF loader rejected an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// Could not open the named file.
    OpenFailed,
    /// The header failed to read fully, or failed a field check.
    MalformedHeader,
    /// A PT_DYNAMIC/PT_INTERP/PT_SHLIB segment was present.
    UnsupportedSegment,
    /// A PT_LOAD segment failed `validate_segment`.
    InvalidSegment,
    /// A page allocation or mapping failed while loading a segment.
    MappingFailed,
    /// The file ran out of bytes before `page_read_bytes` was satisfied.
    ShortRead,
    /// The initial user stack could not be built (see [`crate::args`]).
    StackSetupFailed,
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OpenFailed => "open failed",
            Self::MalformedHeader => "malformed header",
            Self::UnsupportedSegment => "unsupported segment type",
            Self::InvalidSegment => "invalid PT_LOAD segment",
            Self::MappingFailed => "page mapping failed",
            Self::ShortRead => "short read",
            Self::StackSetupFailed => "stack setup failed",
        };
        f.write_str(s)
    }
}
