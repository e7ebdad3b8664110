// src/args.rs
//! Argument marshaller (component C4): tokenises a command line and
//! builds the canonical initial user stack.
//!
//! Grounded in `set_user_stack`/`push_to_user_stack`/`setup_stack` of
//! `original_source/src/userprog/process.c`, but following the cleaner
//! two-pass algorithm this core's own stack-layout description gives
//! (push strings, then build the argv array from recorded addresses)
//! rather than literally porting Pintos's single-pass `strtok_r`/
//! `save_ptr` arithmetic.

use alloc::vec;
use alloc::vec::Vec;

use crate::collab::paging::{self, PageDirectory, UserAddr};
use crate::config::{PGSIZE, PHYS_BASE};
use crate::error::ElfError;

/// Words of stack space reserved below the argument strings for the argc,
/// argv pointer, and fake return address — the `+4` in `(argc + 4) *
/// sizeof(void*)` from the original source; the fourth slot covers the
/// NULL terminator appended to the argv pointer array.
const RESERVED_WORDS: u32 = 4;

/// Map a fresh zero-filled page at the top of the user address space and
/// lay out `argc`/`argv`/the argument strings on it per §4.4. Returns the
/// resulting stack pointer. `cmdline` is tokenised on runs of whitespace;
/// a command line with no tokens at all is rejected (pure-whitespace
/// executable names are rejected earlier, at spawn — see
/// [`crate::process::lifecycle`]). Draws its one page from the
/// process-wide allocator installed via
/// [`crate::collab::paging::install_allocator`].
pub fn build_initial_stack(directory: &mut dyn PageDirectory, cmdline: &str) -> Result<u32, ElfError> {
    let tokens: Vec<&str> = cmdline.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(ElfError::StackSetupFailed);
    }

    let stack_page = UserAddr(PHYS_BASE - PGSIZE as u32);
    let frame = paging::with_allocator(|a| a.alloc_page(true)).ok_or(ElfError::StackSetupFailed)?;
    if !directory.map(stack_page, frame, true) {
        paging::with_allocator(|a| a.free_page(frame));
        return Err(ElfError::StackSetupFailed);
    }

    let base = PHYS_BASE;
    let mut esp = PHYS_BASE;
    let mut addrs = Vec::with_capacity(tokens.len());

    for (i, token) in tokens.iter().enumerate() {
        let mut bytes = Vec::with_capacity(token.len() + 1);
        bytes.extend_from_slice(token.as_bytes());
        bytes.push(0);
        esp -= bytes.len() as u32;

        let argc_so_far = i as u32 + 1;
        let projected_sp = (esp & !0x3) - (argc_so_far + RESERVED_WORDS) * 4;
        if base - projected_sp >= PGSIZE as u32 {
            return Err(ElfError::StackSetupFailed);
        }

        if !directory.write_user(UserAddr(esp), &bytes) {
            return Err(ElfError::StackSetupFailed);
        }
        addrs.push(esp);
    }

    let aligned = esp & !0x3;
    if aligned != esp {
        let pad = vec![0u8; (esp - aligned) as usize];
        if !directory.write_user(UserAddr(aligned), &pad) {
            return Err(ElfError::StackSetupFailed);
        }
    }
    esp = aligned;

    esp -= 4;
    if !directory.write_user(UserAddr(esp), &0u32.to_le_bytes()) {
        return Err(ElfError::StackSetupFailed);
    }

    for &addr in addrs.iter().rev() {
        esp -= 4;
        if !directory.write_user(UserAddr(esp), &addr.to_le_bytes()) {
            return Err(ElfError::StackSetupFailed);
        }
    }

    let argv_ptr = esp;
    esp -= 4;
    if !directory.write_user(UserAddr(esp), &argv_ptr.to_le_bytes()) {
        return Err(ElfError::StackSetupFailed);
    }

    let argc = tokens.len() as u32;
    esp -= 4;
    if !directory.write_user(UserAddr(esp), &argc.to_le_bytes()) {
        return Err(ElfError::StackSetupFailed);
    }

    esp -= 4;
    if !directory.write_user(UserAddr(esp), &0u32.to_le_bytes()) {
        return Err(ElfError::StackSetupFailed);
    }

    Ok(esp)
}
