// src/syscall/mod.rs
//! System-call dispatcher (component C6): decodes a trap frame, validates
//! every argument via [`crate::addr`], and routes to one of the 13
//! handlers in [`handlers`].
//!
//! **Registration.** This crate owns no IDT — installing the vector is
//! the embedding kernel's job. The contract it must honour: vector
//! [`VECTOR`], DPL = 3 (user-callable), interrupts enabled for the
//! duration of the handler, dispatching every trap through [`dispatch`].
//!
//! Grounded in `dispatch`/the `SYSCALL_TABLE` of
//! `src/kernel/syscall/mod.rs` in the teacher crate for the read-number-
//! then-route shape, and in `original_source/src/userprog/syscall.c` for
//! the exact ABI (`f->esp` holds the number, then up to three 4-byte
//! argument slots) and the ABI this crate targets (`SYS_HALT`..`SYS_CLOSE`,
//! not the teacher's own Linux-flavoured table).

pub mod handlers;

use alloc::string::String;
use alloc::vec;

use crate::addr;
use crate::collab::paging::{PageDirectory, UserAddr};
use crate::collab::scheduler;
use crate::config::{NAME_VALIDATE_MAX, PGSIZE};
use crate::process::{lifecycle, Process};
use crate::trapframe::TrapFrame;

/// IDT vector this dispatcher expects to be installed at.
pub const VECTOR: u8 = 0x30;

pub const SYS_HALT: i32 = 0;
pub const SYS_EXIT: i32 = 1;
pub const SYS_EXEC: i32 = 2;
pub const SYS_WAIT: i32 = 3;
pub const SYS_CREATE: i32 = 4;
pub const SYS_REMOVE: i32 = 5;
pub const SYS_OPEN: i32 = 6;
pub const SYS_FILESIZE: i32 = 7;
pub const SYS_READ: i32 = 8;
pub const SYS_WRITE: i32 = 9;
pub const SYS_SEEK: i32 = 10;
pub const SYS_TELL: i32 = 11;
pub const SYS_CLOSE: i32 = 12;

/// Number of 4-byte argument slots each syscall reads off the stack, or
/// `None` for an unrecognised number (→ `exit(-1)`).
fn argument_count(number: i32) -> Option<usize> {
    Some(match number {
        SYS_HALT => 0,
        SYS_EXIT | SYS_EXEC | SYS_WAIT | SYS_REMOVE | SYS_OPEN | SYS_FILESIZE | SYS_TELL | SYS_CLOSE => 1,
        SYS_CREATE | SYS_SEEK => 2,
        SYS_READ | SYS_WRITE => 3,
        _ => return None,
    })
}

fn read_u32(directory: &dyn PageDirectory, addr: UserAddr) -> u32 {
    let mut buf = [0u8; 4];
    directory.read_user(addr, &mut buf);
    u32::from_le_bytes(buf)
}

/// Copy a NUL-terminated name argument out of user memory, already
/// validated by the caller against [`NAME_VALIDATE_MAX`]. Never fails —
/// [`addr::is_cstring_valid`] having passed guarantees every byte up to
/// the NUL (or the bound) is readable.
fn copy_name(directory: &dyn PageDirectory, addr: UserAddr) -> String {
    let mut buf = [0u8; NAME_VALIDATE_MAX];
    let len = addr::copy_user_cstring(directory, addr, &mut buf).unwrap_or(NAME_VALIDATE_MAX);
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

/// Decode, validate, and execute the single syscall named by `frame.esp`,
/// mutating `frame.eax` with its result. `process` is the calling
/// thread's process state; `on_spawn_ready` is forwarded to
/// [`crate::process::lifecycle::spawn`] for `SYS_EXEC` (the embedding
/// kernel's hook for attaching a freshly loaded child to its own thread
/// table — see that module's doc comment for why this crate can't do it
/// alone).
///
/// Returns the (possibly mutated) `process` for every syscall but
/// `SYS_HALT`/`SYS_EXIT` and every validation failure, all of which
/// terminate the calling thread and never return to the caller.
pub fn dispatch(
    mut process: Process,
    frame: &mut TrapFrame,
    on_spawn_ready: impl FnOnce(Process, TrapFrame) + Send + 'static,
) -> Process {
    let esp = UserAddr(frame.esp);

    if !addr::is_range_mapped(process.directory.as_ref(), esp, 4) {
        lifecycle::kill_current(process, -1);
    }
    let number = read_u32(process.directory.as_ref(), esp) as i32;

    let Some(argc) = argument_count(number) else {
        lifecycle::kill_current(process, -1);
    };
    if !addr::is_range_mapped(process.directory.as_ref(), esp, (argc + 1) * 4) {
        lifecycle::kill_current(process, -1);
    }

    let mut args = [0u32; 3];
    for (i, slot) in args.iter_mut().enumerate().take(argc) {
        *slot = read_u32(process.directory.as_ref(), UserAddr(esp.0 + 4 * (i as u32 + 1)));
    }

    // SYS_HALT/SYS_EXIT never return to this function's caller either;
    // everything else writes a result into `frame.eax` and falls through.
    let result = match number {
        SYS_HALT => handlers::halt(),
        SYS_EXIT => lifecycle::kill_current(process, args[0] as i32),
        SYS_EXEC => {
            let cmd = UserAddr(args[0]);
            if !addr::is_cstring_valid(process.directory.as_ref(), cmd, PGSIZE) {
                lifecycle::kill_current(process, -1);
            }
            let mut buf = vec![0u8; PGSIZE];
            let len = addr::copy_user_cstring(process.directory.as_ref(), cmd, &mut buf).unwrap_or(PGSIZE);
            let cmdline = String::from_utf8_lossy(&buf[..len]).into_owned();
            handlers::exec(&mut process, &cmdline, on_spawn_ready)
        }
        SYS_WAIT => handlers::wait(&mut process, args[0] as scheduler::ThreadId),
        SYS_CREATE => {
            let name_addr = UserAddr(args[0]);
            if !addr::is_cstring_valid(process.directory.as_ref(), name_addr, NAME_VALIDATE_MAX) {
                lifecycle::kill_current(process, -1);
            }
            let name = copy_name(process.directory.as_ref(), name_addr);
            i32::from(handlers::create(&name, args[1]))
        }
        SYS_REMOVE => {
            let name_addr = UserAddr(args[0]);
            if !addr::is_cstring_valid(process.directory.as_ref(), name_addr, NAME_VALIDATE_MAX) {
                lifecycle::kill_current(process, -1);
            }
            let name = copy_name(process.directory.as_ref(), name_addr);
            i32::from(handlers::remove(&name))
        }
        SYS_OPEN => {
            let name_addr = UserAddr(args[0]);
            if !addr::is_cstring_valid(process.directory.as_ref(), name_addr, NAME_VALIDATE_MAX) {
                lifecycle::kill_current(process, -1);
            }
            let name = copy_name(process.directory.as_ref(), name_addr);
            handlers::open(&mut process, &name)
        }
        SYS_FILESIZE => {
            let fd = args[0];
            if process.files.get(fd).is_none() {
                lifecycle::kill_current(process, -1);
            }
            handlers::filesize(&process, fd)
        }
        SYS_READ => {
            let fd = args[0];
            let buf_addr = UserAddr(args[1]);
            let n = args[2] as usize;
            if !addr::is_range_mapped(process.directory.as_ref(), buf_addr, n) {
                lifecycle::kill_current(process, -1);
            }
            let mut out = vec![0u8; n];
            let read = handlers::read(&mut process, fd, &mut out);
            if read > 0 {
                process.directory.write_user(buf_addr, &out[..read as usize]);
            }
            read
        }
        SYS_WRITE => {
            let fd = args[0];
            let buf_addr = UserAddr(args[1]);
            let n = args[2] as usize;
            if !addr::is_range_mapped(process.directory.as_ref(), buf_addr, n) {
                lifecycle::kill_current(process, -1);
            }
            let mut data = vec![0u8; n];
            process.directory.read_user(buf_addr, &mut data);
            handlers::write(&mut process, fd, &data)
        }
        SYS_SEEK => {
            handlers::seek(&mut process, args[0], args[1]);
            0
        }
        SYS_TELL => handlers::tell(&process, args[0]),
        SYS_CLOSE => {
            handlers::close(&mut process, args[0]);
            0
        }
        _ => unreachable!("argument_count already rejected unknown syscall numbers"),
    };

    frame.eax = result as u32;
    process
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fakes::{
        FakeConsole, FakeFileSystem, FakePageAllocator, FakePageDirectory, FakePageDirectoryFactory, FakePowerControl,
        FakeScheduler, FakeSemaphoreFactory,
    };
    use crate::collab::paging::PhysPage;
    use crate::collab::{console, fs as fs_mod, paging, power, scheduler as scheduler_mod, sync as sync_mod};
    use crate::config::{PHYS_BASE, TID_ERROR};
    use crate::file_table::FileTable;
    use alloc::boxed::Box;
    use alloc::string::String;
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use lazy_static::lazy_static;
    use std::sync::Mutex as StdMutex;

    // Every test installs fresh globals, matching the rest of the crate's
    // test suites (`elf`, `args`, `process::lifecycle`).
    static GLOBAL_DISPATCH_TEST_LOCK: spin::Mutex<()> = spin::Mutex::new(());

    lazy_static! {
        static ref TEST_SCHEDULER: FakeScheduler = FakeScheduler::new();
        static ref TEST_CONSOLE: FakeConsole = FakeConsole::new();
        static ref TEST_POWER: FakePowerControl = FakePowerControl;
    }

    fn install_fakes(seeded: FakeFileSystem) {
        fs_mod::install_file_system(Box::new(seeded));
        paging::install_allocator(Box::new(FakePageAllocator::new(64)));
        paging::install_directory_factory(&FakePageDirectoryFactory);
        sync_mod::install_semaphore_factory(&FakeSemaphoreFactory);
        scheduler_mod::install_scheduler(&*TEST_SCHEDULER);
        console::install(&*TEST_CONSOLE);
        power::install(&*TEST_POWER);
    }

    const BUF_PAGE: u32 = 0x2000;

    fn stub_process(name: &str, fs: &mut FakeFileSystem) -> Process {
        fs.seed(name, Vec::new());
        let mut directory = FakePageDirectory::new();
        directory.map(UserAddr(BUF_PAGE), PhysPage(900), true);
        Process {
            name: String::from(name),
            directory: Box::new(directory),
            exec_file: fs.open(name).unwrap(),
            files: FileTable::new(),
            children: Vec::new(),
            self_record: None,
        }
    }

    fn write_call(process: &mut Process, esp: u32, number: i32, args: &[u32]) {
        process.directory.write_user(UserAddr(esp), &number.to_le_bytes());
        for (i, arg) in args.iter().enumerate() {
            process.directory.write_user(UserAddr(esp + 4 * (i as u32 + 1)), &arg.to_le_bytes());
        }
    }

    fn frame_at(esp: u32) -> TrapFrame {
        TrapFrame::for_new_process(0, esp)
    }

    #[test]
    fn unmapped_esp_kills_the_caller() {
        let _guard = GLOBAL_DISPATCH_TEST_LOCK.lock();
        let seeded = FakeFileSystem::new();
        install_fakes(seeded);
        let mut fs = FakeFileSystem::new();
        let process = stub_process("victim", &mut fs);
        let mut frame = frame_at(0x9999_0000); // never mapped

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatch(process, &mut frame, |_, _| {});
        }));
        assert!(panicked.is_err(), "FakeScheduler::exit_current panics, proving kill_current ran");
    }

    #[test]
    fn unknown_syscall_number_kills_the_caller() {
        let _guard = GLOBAL_DISPATCH_TEST_LOCK.lock();
        let seeded = FakeFileSystem::new();
        install_fakes(seeded);
        let mut fs = FakeFileSystem::new();
        let mut process = stub_process("victim", &mut fs);
        write_call(&mut process, BUF_PAGE, 999, &[]);
        let mut frame = frame_at(BUF_PAGE);

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatch(process, &mut frame, |_, _| {});
        }));
        assert!(panicked.is_err());
    }

    #[test]
    fn write_to_stdout_reaches_the_console_and_returns_byte_count() {
        let _guard = GLOBAL_DISPATCH_TEST_LOCK.lock();
        let seeded = FakeFileSystem::new();
        install_fakes(seeded);
        let mut fs = FakeFileSystem::new();
        let mut process = stub_process("p", &mut fs);

        let message_addr = BUF_PAGE + 64;
        process.directory.write_user(UserAddr(message_addr), b"hi");
        write_call(&mut process, BUF_PAGE, SYS_WRITE, &[1, message_addr, 2]);
        let mut frame = frame_at(BUF_PAGE);

        let process = dispatch(process, &mut frame, |_, _| {});
        assert_eq!(frame.eax, 2);
        assert!(TEST_CONSOLE.written().ends_with(b"hi"));
        drop(process);
    }

    #[test]
    fn create_open_read_round_trips_through_the_file_system() {
        let _guard = GLOBAL_DISPATCH_TEST_LOCK.lock();
        let seeded = FakeFileSystem::new();
        install_fakes(seeded);
        let mut fs = FakeFileSystem::new();
        let mut process = stub_process("p", &mut fs);

        let name_addr = BUF_PAGE + 8;
        process.directory.write_user(UserAddr(name_addr), b"f\0");
        write_call(&mut process, BUF_PAGE, SYS_CREATE, &[name_addr, 4]);
        let mut frame = frame_at(BUF_PAGE);
        let mut process = dispatch(process, &mut frame, |_, _| {});
        assert_eq!(frame.eax, 1, "create must report success");

        write_call(&mut process, BUF_PAGE, SYS_OPEN, &[name_addr]);
        let mut process = dispatch(process, &mut frame, |_, _| {});
        let fd = frame.eax;
        assert!(fd >= 2);

        let out_addr = BUF_PAGE + 100;
        write_call(&mut process, BUF_PAGE, SYS_READ, &[fd, out_addr, 4]);
        let process = dispatch(process, &mut frame, |_, _| {});
        assert_eq!(frame.eax, 4, "a freshly created 4-byte file reads 4 zero bytes");
        drop(process);
    }

    #[test]
    fn read_past_phys_base_kills_the_caller() {
        let _guard = GLOBAL_DISPATCH_TEST_LOCK.lock();
        let seeded = FakeFileSystem::new();
        install_fakes(seeded);
        let mut fs = FakeFileSystem::new();
        let mut process = stub_process("p", &mut fs);
        // straddles PHYS_BASE
        write_call(&mut process, BUF_PAGE, SYS_READ, &[0, PHYS_BASE - 32, 100]);
        let mut frame = frame_at(BUF_PAGE);

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatch(process, &mut frame, |_, _| {});
        }));
        assert!(panicked.is_err());
    }

    #[test]
    fn wait_on_unknown_tid_returns_negative_one() {
        let _guard = GLOBAL_DISPATCH_TEST_LOCK.lock();
        let seeded = FakeFileSystem::new();
        install_fakes(seeded);
        let mut fs = FakeFileSystem::new();
        let mut process = stub_process("p", &mut fs);
        write_call(&mut process, BUF_PAGE, SYS_WAIT, &[777]);
        let mut frame = frame_at(BUF_PAGE);

        let process = dispatch(process, &mut frame, |_, _| {});
        assert_eq!(frame.eax as i32, TID_ERROR);
        drop(process);
    }

    #[test]
    fn exec_invokes_on_spawn_ready_and_returns_real_tid() {
        let _guard = GLOBAL_DISPATCH_TEST_LOCK.lock();
        let mut seeded = FakeFileSystem::new();
        seeded.seed("prog", fake_executable());
        install_fakes(seeded);
        let mut fs = FakeFileSystem::new();
        let mut process = stub_process("parent", &mut fs);

        let cmd_addr = BUF_PAGE + 8;
        process.directory.write_user(UserAddr(cmd_addr), b"prog\0");
        write_call(&mut process, BUF_PAGE, SYS_EXEC, &[cmd_addr]);
        let mut frame = frame_at(BUF_PAGE);

        let received: Arc<StdMutex<Option<Process>>> = Arc::new(StdMutex::new(None));
        let received_clone = Arc::clone(&received);
        let process = dispatch(process, &mut frame, move |child, _frame| {
            *received_clone.lock().unwrap() = Some(child);
        });

        assert!(frame.eax as i32 > 0, "expected a real tid, got {}", frame.eax as i32);
        assert!(received.lock().unwrap().is_some());
        drop(process);
    }

    fn le(buf: &mut [u8], offset: usize, value: u32, width: usize) {
        let bytes = value.to_le_bytes();
        buf[offset..offset + width].copy_from_slice(&bytes[..width]);
    }

    /// A minimal one-segment executable, identical in shape to the one
    /// `process::lifecycle`'s test suite builds.
    fn fake_executable() -> Vec<u8> {
        use crate::elf::{ElfHeader, ProgramHeader};
        const PT_LOAD: u32 = 1;
        const PF_W: u32 = 2;
        let phdr_off = ElfHeader::SIZE;
        let seg_off = phdr_off + ProgramHeader::SIZE;

        let mut buf = alloc::vec![0u8; seg_off + 4];
        buf[0..7].copy_from_slice(&[0x7f, b'E', b'L', b'F', 0x01, 0x01, 0x01]);
        le(&mut buf, 16, 2, 2);
        le(&mut buf, 18, 3, 2);
        le(&mut buf, 20, 1, 4);
        le(&mut buf, 24, 0x1000, 4);
        le(&mut buf, 28, phdr_off as u32, 4);
        le(&mut buf, 42, ProgramHeader::SIZE as u32, 2);
        le(&mut buf, 44, 1, 2);

        le(&mut buf, phdr_off, PT_LOAD, 4);
        le(&mut buf, phdr_off + 4, seg_off as u32, 4);
        le(&mut buf, phdr_off + 8, 0x1000, 4);
        le(&mut buf, phdr_off + 16, 4, 4);
        le(&mut buf, phdr_off + 20, 4, 4);
        le(&mut buf, phdr_off + 24, PF_W, 4);

        buf[seg_off..seg_off + 4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        buf
    }
}
