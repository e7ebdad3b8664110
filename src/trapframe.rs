// src/trapframe.rs
//! The interrupt/trap frame and the synthetic return-from-interrupt
//! trampoline used to start a freshly loaded process.
//!
//! The trap frame is logically owned by the interrupt-entry assembly stub,
//! not this crate (§3's "Interrupt/trap frame (external)"); this module
//! defines the typed view of it this core actually reads and writes, plus
//! the one inherently platform-specific primitive the design notes call
//! for: a single `enter_user` isolating the `iret`-style trampoline from
//! everything else. Grounded in `jump_to_usermode_simple` of
//! `kernel/usermode.rs` in the teacher crate, ported from the teacher's
//! 64-bit `iretq` to the 32-bit `iret` this core's ABI needs, and from a
//! concrete `VirtAddr`/GDT-selector pair to the frame-struct shape
//! `process::lifecycle::bootstrap` builds.

/// User-mode data segment selector, RPL = 3 (`SEL_UDSEG` in the original).
pub const SEL_UDSEG: u16 = 0x1b;
/// User-mode code segment selector, RPL = 3 (`SEL_UCSEG` in the original).
pub const SEL_UCSEG: u16 = 0x23;
/// Interrupt-enable flag, always set on entry to a fresh process.
pub const FLAG_IF: u32 = 1 << 9;
/// Reserved eflags bit that must always read as 1.
pub const FLAG_MBS: u32 = 1 << 1;

/// The register state materialised by `enter_user` to start (or resume)
/// user-mode execution. Built once by
/// [`crate::process::lifecycle::bootstrap`] for a freshly loaded process;
/// the dispatcher in [`crate::syscall`] reads `esp` and writes `eax` on a
/// trap back into the kernel.
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    pub eip: u32,
    pub esp: u32,
    pub eflags: u32,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
    pub ss: u16,
    /// The accumulator register: syscall return values are written here
    /// before resuming the caller.
    pub eax: u32,
}

impl TrapFrame {
    /// Build the initial frame for a freshly loaded process: user data
    /// segments everywhere, interrupts enabled, entry point and stack
    /// pointer as produced by [`crate::elf::load`] and
    /// [`crate::args::build_initial_stack`].
    #[must_use]
    pub fn for_new_process(entry: u32, esp: u32) -> Self {
        Self {
            eip: entry,
            esp,
            eflags: FLAG_IF | FLAG_MBS,
            cs: SEL_UCSEG,
            ds: SEL_UDSEG,
            es: SEL_UDSEG,
            fs: SEL_UDSEG,
            gs: SEL_UDSEG,
            ss: SEL_UDSEG,
            eax: 0,
        }
    }
}

/// Materialise `frame` and resume execution in user mode. Never returns —
/// the next time this thread runs kernel code is on its next trap, which
/// re-enters through the syscall dispatcher or an exception handler, not
/// through this call returning.
///
/// # Safety
/// `frame` must describe a valid, fully set up user address space (a
/// loaded executable and an initial stack) or the processor will fault
/// immediately after the `iret`.
#[cfg(all(not(test), target_arch = "x86"))]
pub unsafe fn enter_user(frame: &TrapFrame) -> ! {
    // SAFETY: forwarded from the caller's contract above.
    unsafe {
        core::arch::asm!(
            "mov ds, {ds:x}",
            "mov es, {es:x}",
            "mov fs, {fs:x}",
            "mov gs, {gs:x}",
            "push {ss:e}",
            "push {esp:e}",
            "push {eflags:e}",
            "push {cs:e}",
            "push {eip:e}",
            "iretd",
            ds = in(reg) u32::from(frame.ds),
            es = in(reg) u32::from(frame.es),
            fs = in(reg) u32::from(frame.fs),
            gs = in(reg) u32::from(frame.gs),
            ss = in(reg) u32::from(frame.ss),
            esp = in(reg) frame.esp,
            eflags = in(reg) frame.eflags,
            cs = in(reg) u32::from(frame.cs),
            eip = in(reg) frame.eip,
            options(noreturn)
        )
    }
}

/// Non-i686 stand-in so the crate still typechecks when built (or tested)
/// on a host architecture. Never reached: nothing in the test suite
/// exercises the actual user-mode transition, only the frame this module
/// builds for it.
#[cfg(any(test, not(target_arch = "x86")))]
pub unsafe fn enter_user(_frame: &TrapFrame) -> ! {
    unreachable!("enter_user is the real-hardware trampoline; it is never invoked off target")
}
