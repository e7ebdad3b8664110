// src/collab/paging.rs
//! Page allocator and page directory contracts.
//!
//! Grounded in `kernel/mm/allocator.rs` and `kernel/process/mod.rs` of the
//! teacher crate (a global `Mutex<Option<FrameAllocator>>`, `PhysFrame`
//! newtypes), adapted to 32-bit addresses and to the trait-object shape a
//! library core needs instead of the teacher's concrete `x86_64` paging
//! types (which only model 64-bit page tables).

use alloc::boxed::Box;
use lazy_static::lazy_static;
use spin::Mutex;

/// A 32-bit user virtual address. Per the design notes, this is the only
/// representation handler code ever holds of a user pointer — it is never
/// dereferenced directly, only handed to [`crate::addr`]'s validator and
/// bulk-copy helpers or to a [`PageDirectory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserAddr(pub u32);

impl UserAddr {
    /// The page-aligned address containing this one.
    #[must_use]
    pub const fn page_base(self) -> Self {
        Self(self.0 & !(crate::config::PGMASK as u32))
    }

    #[must_use]
    pub const fn offset_in_page(self) -> u32 {
        self.0 & crate::config::PGMASK as u32
    }
}

/// A physical page frame, opaque to everything except the allocator and
/// directory implementations that hand them out and consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysPage(pub u32);

/// Allocates and frees 4 KiB physical frames from the user pool.
pub trait PageAllocator: Send {
    /// Allocate one frame. `zeroed` requests the frame be zero-filled
    /// before it's handed back (used by the stack's zero-fill and by
    /// zero-only PT_LOAD segments).
    fn alloc_page(&mut self, zeroed: bool) -> Option<PhysPage>;

    /// Return a frame to the pool.
    fn free_page(&mut self, page: PhysPage);
}

/// A per-process page table.
///
/// `map`/`unmap`/`lookup`/`is_writable`/`set_writable` operate at `PGSIZE`
/// granularity, exactly mirroring the Pintos `pagedir_*` calls this
/// crate's loader (`src/elf.rs`) and exit path were ported from.
pub trait PageDirectory: Send {
    /// Switch the CPU to this directory (`pagedir_activate`).
    fn activate(&mut self);

    /// Map `upage` (already page-aligned) to `frame`. Fails if `upage` is
    /// already mapped.
    fn map(&mut self, upage: UserAddr, frame: PhysPage, writable: bool) -> bool;

    /// Remove a mapping, returning the frame that was mapped there, if any.
    fn unmap(&mut self, upage: UserAddr) -> Option<PhysPage>;

    /// Look up the frame mapped at `upage`, if any.
    fn lookup(&self, upage: UserAddr) -> Option<PhysPage>;

    /// Whether the page containing `upage` is currently writable. Used by
    /// the loader's "promoted, never demoted" rule for overlapping PT_LOAD
    /// segments.
    fn is_writable(&self, upage: UserAddr) -> bool;

    /// Promote or demote the writable bit of an already-mapped page.
    fn set_writable(&mut self, upage: UserAddr, writable: bool);

    /// Bulk-copy `out.len()` bytes starting at `addr` out of user memory.
    /// Returns `false` if any touched page is unmapped. Never called
    /// without `addr`/`out.len()` having already passed
    /// [`crate::addr::is_range_valid`].
    fn read_user(&self, addr: UserAddr, out: &mut [u8]) -> bool;

    /// Bulk-copy `data` into user memory starting at `addr`. Same
    /// preconditions as [`PageDirectory::read_user`].
    fn write_user(&mut self, addr: UserAddr, data: &[u8]) -> bool;
}

/// Creates fresh, empty page directories (`pagedir_create` + the kernel-half
/// copy every directory needs). A separate trait from [`PageDirectory`]
/// because creation doesn't operate on an existing instance.
pub trait PageDirectoryFactory: Send + Sync {
    /// Allocate a new page directory. `None` on out-of-memory.
    fn create(&self) -> Option<Box<dyn PageDirectory>>;

    /// Destroy a directory previously returned by `create`, releasing every
    /// frame it still maps. Called by process exit after deactivating it.
    fn destroy(&self, directory: Box<dyn PageDirectory>);
}

lazy_static! {
    static ref ALLOCATOR: Mutex<Option<Box<dyn PageAllocator>>> = Mutex::new(None);
    static ref DIRECTORY_FACTORY: Mutex<Option<&'static dyn PageDirectoryFactory>> = Mutex::new(None);
}

/// Install the process-wide user-pool allocator. There is exactly one of
/// these per machine, matching Pintos's single `palloc` user pool.
pub fn install_allocator(allocator: Box<dyn PageAllocator>) {
    *ALLOCATOR.lock() = Some(allocator);
}

/// Run `f` against the installed allocator. Panics if none has been
/// installed.
pub fn with_allocator<R>(f: impl FnOnce(&mut dyn PageAllocator) -> R) -> R {
    let mut guard = ALLOCATOR.lock();
    let allocator = guard.as_deref_mut().expect("page allocator not installed");
    f(allocator)
}

/// Install the process-wide page directory factory.
pub fn install_directory_factory(factory: &'static dyn PageDirectoryFactory) {
    *DIRECTORY_FACTORY.lock() = Some(factory);
}

/// The installed page directory factory. Panics if none has been
/// installed.
#[must_use]
pub fn current_directory_factory() -> &'static dyn PageDirectoryFactory {
    DIRECTORY_FACTORY.lock().expect("page directory factory not installed")
}
