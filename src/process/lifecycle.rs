// src/process/lifecycle.rs
//! Process lifecycle (component C5): spawn, bootstrap, exit, wait.
//!
//! Grounded in `process_execute`/`start_process`/`process_wait`/
//! `process_exit` of `original_source/src/userprog/process.c`. Two
//! deliberate departures from that source, both recorded in `DESIGN.md`:
//!
//! - The raw `void **ref` cross-link is replaced by a shared `Arc`
//!   ([`super::child::ChildRecord`]); there is no separate "null the other
//!   side's pointer" step because dropping an `Arc` clone already is that
//!   step.
//! - `thread_create`'s `(entry_fn, aux_ptr)` pair is replaced by a single
//!   `Box<dyn FnOnce() + Send>` bootstrap closure per
//!   [`crate::collab::scheduler::Scheduler::spawn`]; since that closure
//!   cannot hand a return value back to its caller, the new thread's
//!   freshly built [`super::Process`] and [`TrapFrame`] are handed to the
//!   embedding kernel through an explicit `on_ready` callback (supplied by
//!   whoever calls `spawn`) rather than through a field the caller reads
//!   after the fact. `on_ready` — not this module — makes the final call
//!   to [`crate::trapframe::enter_user`], since only the embedding kernel knows
//!   what thread-switch bookkeeping (TSS, segment state) needs to happen
//!   immediately beforehand.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::args;
use crate::collab::{fs, paging, scheduler, sync};
use crate::config::{INITIAL_EXIT_STATUS, NAME_MAX, TID_ERROR};
use crate::debug_println;
use crate::elf::{self, LoadedImage};
use crate::file_table::FileTable;
use crate::trapframe::TrapFrame;

use super::{ChildRecord, Process};

/// The executable base name `spawn` extracts for the new thread's
/// human-readable name and for locating the file to load: the first
/// whitespace-delimited token of `cmdline`, bounded to [`NAME_MAX`]
/// characters. Empty (a pure-whitespace or empty command line) signals
/// rejection.
fn extract_exec_name(cmdline: &str) -> String {
    cmdline.split_whitespace().next().unwrap_or("").chars().take(NAME_MAX).collect()
}

/// Spawn a new process running `cmdline`. Returns the child's thread id,
/// or [`TID_ERROR`] if the executable name is empty, the scheduler
/// couldn't create a thread, or bootstrap failed to load it.
///
/// `on_ready` is called exactly once, on the new thread, with the fully
/// built [`Process`] and the [`TrapFrame`] ready to resume it — iff
/// bootstrap succeeds. The embedding kernel is expected to attach the
/// process to whatever it uses to represent "the current thread's
/// process", then call [`crate::trapframe::enter_user`] to actually resume in
/// user mode (see the module doc for why that last step isn't done here).
pub fn spawn(parent: &mut Process, cmdline: &str, on_ready: impl FnOnce(Process, TrapFrame) + Send + 'static) -> i32 {
    let exec_name = extract_exec_name(cmdline);
    if exec_name.is_empty() {
        return TID_ERROR;
    }

    let record = ChildRecord::new(sync::current_semaphore_factory().create(0));
    parent.children.push(Arc::clone(&record));

    let load_semaphore: Arc<dyn sync::Semaphore> = Arc::from(sync::current_semaphore_factory().create(0));
    let success = Arc::new(AtomicBool::new(false));

    let cmdline_owned = String::from(cmdline);
    let bootstrap_exec_name = exec_name.clone();
    let bootstrap_record = Arc::clone(&record);
    let bootstrap_semaphore = Arc::clone(&load_semaphore);
    let bootstrap_success = Arc::clone(&success);

    let spawned = scheduler::current_scheduler().spawn(
        &exec_name,
        scheduler::PRI_DEFAULT,
        Box::new(move || match bootstrap(&cmdline_owned, &bootstrap_exec_name, &bootstrap_record) {
            Ok((process, frame)) => {
                bootstrap_success.store(true, Ordering::Release);
                bootstrap_semaphore.up();
                on_ready(process, frame);
            }
            Err(()) => {
                bootstrap_semaphore.up();
                scheduler::current_scheduler().exit_current();
            }
        }),
    );

    let Some(tid) = spawned else {
        parent.children.retain(|c| !Arc::ptr_eq(c, &record));
        return TID_ERROR;
    };
    record.set_tid(tid);

    load_semaphore.down();
    if !success.load(Ordering::Acquire) {
        return TID_ERROR;
    }
    tid
}

/// Runs on the new thread. Loads `exec_name` (via C3), arranges its
/// argv/argc on a fresh stack from the full `cmdline` (via C4), and
/// cross-links `record` to the process it built. On any failure, emits
/// the termination message and signals `record` with status -1 itself
/// (there is no [`Process`] yet for a later `exit` to operate on), then
/// returns `Err(())` so the caller exits the thread.
fn bootstrap(cmdline: &str, exec_name: &str, record: &Arc<ChildRecord>) -> Result<(Process, TrapFrame), ()> {
    let mut image = match elf::load(exec_name) {
        Ok(image) => image,
        Err(_) => {
            report_bootstrap_failure(exec_name, record);
            return Err(());
        }
    };

    let esp = match args::build_initial_stack(image.directory.as_mut(), cmdline) {
        Ok(esp) => esp,
        Err(_) => {
            discard_failed_image(image, exec_name);
            report_bootstrap_failure(exec_name, record);
            return Err(());
        }
    };

    let LoadedImage { entry, directory, exec_file } = image;
    let process = Process {
        name: String::from(exec_name),
        directory,
        exec_file,
        files: FileTable::new(),
        children: alloc::vec::Vec::new(),
        self_record: Some(Arc::clone(record)),
    };
    let frame = TrapFrame::for_new_process(entry, esp);
    Ok((process, frame))
}

fn report_bootstrap_failure(exec_name: &str, record: &Arc<ChildRecord>) {
    debug_println!("{}: exit({})", exec_name, INITIAL_EXIT_STATUS);
    record.set_status_and_signal(INITIAL_EXIT_STATUS);
}

fn discard_failed_image(image: LoadedImage, exec_name: &str) {
    fs::with_file_system(|f| f.allow_write(exec_name));
    drop(image.exec_file);
    paging::current_directory_factory().destroy(image.directory);
}

/// Entered by any thread that has decided to stop running its process:
/// a `SYS_EXIT` syscall, a kernel-initiated termination, or a bootstrap
/// that failed after a [`Process`] had already been built. Closes the
/// executable (re-enabling writes) and every open file, detaches every
/// live child, and — if this process was itself spawned — emits the
/// termination message and signals its own record before destroying its
/// address space.
pub fn exit(mut process: Process, status: i32) {
    fs::with_file_system(|f| f.allow_write(&process.name));
    drop(process.exec_file);

    for fd in process.files.open_fds() {
        process.files.close(fd);
    }

    process.children.clear();

    if let Some(record) = process.self_record.take() {
        debug_println!("{}: exit({})", process.name, status);
        record.set_status_and_signal(status);
    }

    paging::current_directory_factory().destroy(process.directory);
}

/// Wait for the child named `tid` to exit, returning its status. -1 if
/// `tid` never named a live child of `process` (not a child, or already
/// waited on).
pub fn wait(process: &mut Process, tid: scheduler::ThreadId) -> i32 {
    match process.take_child(tid) {
        Some(record) => record.wait(),
        None => TID_ERROR,
    }
}

/// Entered by the syscall dispatcher for both a user-requested `SYS_EXIT`
/// and a kernel-initiated termination (bad pointer, unknown syscall): the
/// two have identical fallout on `process::exit`, so there is only one
/// path. Never returns — tears the process down via [`exit`] and then
/// ends the calling thread through the scheduler.
pub fn kill_current(process: Process, status: i32) -> ! {
    exit(process, status);
    scheduler::current_scheduler().exit_current()
}
