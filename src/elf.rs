// src/elf.rs
//! ELF32 loader (component C3).
//!
//! Parses an ELF32 executable and maps its `PT_LOAD` segments into a
//! freshly created user address space. Grounded in `load`/`validate_segment`/
//! `load_segment`/`install_page` of `original_source/src/userprog/process.c`;
//! the struct layouts below are this crate's typed stand-in for that file's
//! `struct Elf32_Ehdr`/`struct Elf32_Phdr`.

use alloc::boxed::Box;
use alloc::vec;

use crate::collab::fs::{self, FileHandle};
use crate::collab::paging::{self, PageDirectory, UserAddr};
use crate::config::{MAX_PHDRS, PGMASK, PGSIZE, PHYS_BASE};
use crate::error::ElfError;

const PT_NULL: u32 = 0;
const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;
const PT_NOTE: u32 = 4;
const PT_SHLIB: u32 = 5;
const PT_PHDR: u32 = 6;
const PT_STACK: u32 = 0x6474_e551;

const PF_W: u32 = 2;

const ELF_MAGIC: [u8; 7] = [0x7f, b'E', b'L', b'F', 0x01, 0x01, 0x01];

/// The fixed fields of an ELF32 executable header this loader cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_phentsize: u16,
    pub e_phnum: u16,
}

impl ElfHeader {
    /// Byte size of an ELF32 file header.
    pub const SIZE: usize = 52;

    /// Parse and validate a header per §4.3 step 3. `buf` must be exactly
    /// [`ElfHeader::SIZE`] bytes.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() != Self::SIZE || buf[0..7] != ELF_MAGIC {
            return None;
        }
        let header = Self {
            e_type: le16(&buf[16..18]),
            e_machine: le16(&buf[18..20]),
            e_version: le32(&buf[20..24]),
            e_entry: le32(&buf[24..28]),
            e_phoff: le32(&buf[28..32]),
            e_phentsize: le16(&buf[42..44]),
            e_phnum: le16(&buf[44..46]),
        };
        if header.e_type != 2
            || header.e_machine != 3
            || header.e_version != 1
            || header.e_phentsize as usize != ProgramHeader::SIZE
            || header.e_phnum > MAX_PHDRS
        {
            return None;
        }
        Some(header)
    }
}

/// A single ELF32 program header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
}

impl ProgramHeader {
    /// Byte size of an ELF32 program header entry.
    pub const SIZE: usize = 32;

    /// Parse a program header entry. `buf` must be exactly
    /// [`ProgramHeader::SIZE`] bytes. Performs no semantic validation —
    /// that's [`validate_load_segment`].
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() != Self::SIZE {
            return None;
        }
        Some(Self {
            p_type: le32(&buf[0..4]),
            p_offset: le32(&buf[4..8]),
            p_vaddr: le32(&buf[8..12]),
            p_filesz: le32(&buf[16..20]),
            p_memsz: le32(&buf[20..24]),
            p_flags: le32(&buf[24..28]),
        })
    }
}

fn le16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn round_up(value: u32, multiple: u32) -> u32 {
    (value + multiple - 1) & !(multiple - 1)
}

/// Checks whether `phdr` describes a valid, loadable `PT_LOAD` segment
/// against a file of length `file_len`. Mirrors `validate_segment`.
pub fn validate_load_segment(phdr: &ProgramHeader, file_len: u32) -> Result<(), ElfError> {
    if (phdr.p_offset & PGMASK as u32) != (phdr.p_vaddr & PGMASK as u32) {
        return Err(ElfError::InvalidSegment);
    }
    if phdr.p_offset > file_len {
        return Err(ElfError::InvalidSegment);
    }
    if phdr.p_memsz < phdr.p_filesz {
        return Err(ElfError::InvalidSegment);
    }
    if phdr.p_memsz == 0 {
        return Err(ElfError::InvalidSegment);
    }
    let end = phdr.p_vaddr.checked_add(phdr.p_memsz).ok_or(ElfError::InvalidSegment)?;
    if end > PHYS_BASE {
        return Err(ElfError::InvalidSegment);
    }
    if phdr.p_vaddr < PGSIZE as u32 {
        return Err(ElfError::InvalidSegment);
    }
    Ok(())
}

/// An executable successfully loaded into a fresh address space, ready for
/// [`crate::args::build_initial_stack`] to finish preparing its stack.
pub struct LoadedImage {
    pub entry: u32,
    pub directory: Box<dyn PageDirectory>,
    pub exec_file: Box<dyn FileHandle>,
}

/// Load the executable named `name` into a freshly created address space.
/// Implements §4.3 steps 1-4 (stack construction is §4.4, left to the
/// caller so this module stays about ELF mechanics only). Draws pages from
/// the process-wide allocator installed via
/// [`crate::collab::paging::install_allocator`].
///
/// On any failure after the address space is created, that space is
/// destroyed before returning — unlike the original source, which leaves a
/// half-built page directory attached to the thread for `process_exit` to
/// clean up later. This crate's bootstrap never constructs a `Process` for
/// a load that didn't succeed, so there is nothing for a later exit to
/// operate on; cleanup has to happen here instead.
pub fn load(name: &str) -> Result<LoadedImage, ElfError> {
    let mut directory = paging::current_directory_factory()
        .create()
        .ok_or(ElfError::MappingFailed)?;
    directory.activate();

    match load_into(name, directory.as_mut()) {
        Ok((entry, exec_file)) => Ok(LoadedImage { entry, directory, exec_file }),
        Err(e) => {
            paging::current_directory_factory().destroy(directory);
            Err(e)
        }
    }
}

fn load_into(name: &str, directory: &mut dyn PageDirectory) -> Result<(u32, Box<dyn FileHandle>), ElfError> {
    let mut exec_file = fs::with_file_system(|f| f.open(name)).ok_or(ElfError::OpenFailed)?;
    fs::with_file_system(|f| f.deny_write(name));

    let mut header_buf = [0u8; ElfHeader::SIZE];
    if exec_file.read(&mut header_buf) as usize != ElfHeader::SIZE {
        return Err(ElfError::MalformedHeader);
    }
    let header = ElfHeader::parse(&header_buf).ok_or(ElfError::MalformedHeader)?;

    let mut file_ofs = header.e_phoff;
    for _ in 0..header.e_phnum {
        if file_ofs > exec_file.length() {
            return Err(ElfError::MalformedHeader);
        }
        exec_file.seek(file_ofs);
        let mut phdr_buf = [0u8; ProgramHeader::SIZE];
        if exec_file.read(&mut phdr_buf) as usize != ProgramHeader::SIZE {
            return Err(ElfError::MalformedHeader);
        }
        file_ofs += ProgramHeader::SIZE as u32;
        let phdr = ProgramHeader::parse(&phdr_buf).ok_or(ElfError::MalformedHeader)?;

        match phdr.p_type {
            PT_NULL | PT_NOTE | PT_PHDR | PT_STACK => {}
            PT_DYNAMIC | PT_INTERP | PT_SHLIB => return Err(ElfError::UnsupportedSegment),
            PT_LOAD => {
                validate_load_segment(&phdr, exec_file.length())?;
                let writable = phdr.p_flags & PF_W != 0;
                let file_page = phdr.p_offset & !(PGMASK as u32);
                let mem_page = phdr.p_vaddr & !(PGMASK as u32);
                let page_offset = phdr.p_vaddr & PGMASK as u32;
                let (read_bytes, zero_bytes) = if phdr.p_filesz > 0 {
                    let read_bytes = page_offset + phdr.p_filesz;
                    let zero_bytes = round_up(page_offset + phdr.p_memsz, PGSIZE as u32) - read_bytes;
                    (read_bytes, zero_bytes)
                } else {
                    (0, round_up(page_offset + phdr.p_memsz, PGSIZE as u32))
                };
                load_segment(exec_file.as_mut(), file_page, mem_page, read_bytes, zero_bytes, writable, directory)?;
            }
            _ => {}
        }
    }

    Ok((header.e_entry, exec_file))
}

/// Maps `read_bytes + zero_bytes` (a whole number of pages) of virtual
/// memory starting at `upage_start`, reading `read_bytes` from `file`
/// starting at `ofs` and zero-filling the remainder. Mirrors `load_segment`,
/// including the "promoted, never demoted" writable-bit rule for a page
/// revisited by an overlapping segment.
fn load_segment(
    file: &mut dyn FileHandle,
    ofs: u32,
    upage_start: u32,
    mut read_bytes: u32,
    mut zero_bytes: u32,
    writable: bool,
    directory: &mut dyn PageDirectory,
) -> Result<(), ElfError> {
    file.seek(ofs);
    let mut upage = upage_start;
    while read_bytes > 0 || zero_bytes > 0 {
        let page_read = read_bytes.min(PGSIZE as u32);
        let page_zero = PGSIZE as u32 - page_read;
        let addr = UserAddr(upage);

        if directory.lookup(addr).is_some() {
            if writable && !directory.is_writable(addr) {
                directory.set_writable(addr, true);
            }
        } else {
            let frame = paging::with_allocator(|a| a.alloc_page(false)).ok_or(ElfError::MappingFailed)?;
            if !directory.map(addr, frame, writable) {
                paging::with_allocator(|a| a.free_page(frame));
                return Err(ElfError::MappingFailed);
            }
        }

        let mut buf = vec![0u8; page_read as usize];
        if file.read(&mut buf) as usize != page_read as usize {
            return Err(ElfError::ShortRead);
        }
        if !directory.write_user(addr, &buf) {
            return Err(ElfError::MappingFailed);
        }
        if page_zero > 0 {
            let zeros = vec![0u8; page_zero as usize];
            if !directory.write_user(UserAddr(upage + page_read), &zeros) {
                return Err(ElfError::MappingFailed);
            }
        }

        read_bytes -= page_read;
        zero_bytes -= page_zero;
        upage += PGSIZE as u32;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fakes::{FakeFileSystem, FakePageAllocator, FakePageDirectoryFactory};

    // `load` reads through the process-wide file-system singleton (§5's
    // global file-system lock), so tests that install one must not run
    // concurrently with each other.
    static GLOBAL_FS_TEST_LOCK: spin::Mutex<()> = spin::Mutex::new(());

    fn header_bytes(e_phoff: u32, e_phnum: u16, e_entry: u32) -> [u8; ElfHeader::SIZE] {
        let mut buf = [0u8; ElfHeader::SIZE];
        buf[0..7].copy_from_slice(&ELF_MAGIC);
        buf[16..18].copy_from_slice(&2u16.to_le_bytes());
        buf[18..20].copy_from_slice(&3u16.to_le_bytes());
        buf[20..24].copy_from_slice(&1u32.to_le_bytes());
        buf[24..28].copy_from_slice(&e_entry.to_le_bytes());
        buf[28..32].copy_from_slice(&e_phoff.to_le_bytes());
        buf[42..44].copy_from_slice(&(ProgramHeader::SIZE as u16).to_le_bytes());
        buf[44..46].copy_from_slice(&e_phnum.to_le_bytes());
        buf
    }

    fn phdr_bytes(p_type: u32, p_offset: u32, p_vaddr: u32, p_filesz: u32, p_memsz: u32, p_flags: u32) -> [u8; ProgramHeader::SIZE] {
        let mut buf = [0u8; ProgramHeader::SIZE];
        buf[0..4].copy_from_slice(&p_type.to_le_bytes());
        buf[4..8].copy_from_slice(&p_offset.to_le_bytes());
        buf[8..12].copy_from_slice(&p_vaddr.to_le_bytes());
        buf[16..20].copy_from_slice(&p_filesz.to_le_bytes());
        buf[20..24].copy_from_slice(&p_memsz.to_le_bytes());
        buf[24..28].copy_from_slice(&p_flags.to_le_bytes());
        buf
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut buf = header_bytes(ElfHeader::SIZE as u32, 0, 0x1000);
        buf[0] = 0;
        assert!(ElfHeader::parse(&buf).is_none());
    }

    #[test]
    fn header_rejects_too_many_program_headers() {
        let buf = header_bytes(ElfHeader::SIZE as u32, MAX_PHDRS + 1, 0x1000);
        assert!(ElfHeader::parse(&buf).is_none());
    }

    #[test]
    fn header_accepts_well_formed_executable() {
        let buf = header_bytes(ElfHeader::SIZE as u32, 1, 0x8048000);
        let header = ElfHeader::parse(&buf).expect("valid header");
        assert_eq!(header.e_entry, 0x8048000);
        assert_eq!(header.e_phnum, 1);
    }

    #[test]
    fn validate_rejects_page_zero_mapping() {
        let phdr = ProgramHeader {
            p_type: PT_LOAD,
            p_offset: 0,
            p_vaddr: 0,
            p_filesz: 4,
            p_memsz: 4,
            p_flags: PF_W,
        };
        assert_eq!(validate_load_segment(&phdr, 100), Err(ElfError::InvalidSegment));
    }

    #[test]
    fn validate_rejects_mismatched_page_offsets() {
        let phdr = ProgramHeader {
            p_type: PT_LOAD,
            p_offset: 0,
            p_vaddr: 0x1001,
            p_filesz: 4,
            p_memsz: 4,
            p_flags: 0,
        };
        assert_eq!(validate_load_segment(&phdr, 100), Err(ElfError::InvalidSegment));
    }

    #[test]
    fn validate_rejects_wraparound() {
        let phdr = ProgramHeader {
            p_type: PT_LOAD,
            p_offset: 0x1000,
            p_vaddr: 0x1000,
            p_filesz: 4,
            p_memsz: u32::MAX,
            p_flags: 0,
        };
        assert_eq!(validate_load_segment(&phdr, 100), Err(ElfError::InvalidSegment));
    }

    #[test]
    fn validate_accepts_well_formed_segment() {
        let phdr = ProgramHeader {
            p_type: PT_LOAD,
            p_offset: 0x1000,
            p_vaddr: 0x1000,
            p_filesz: 4,
            p_memsz: 4,
            p_flags: PF_W,
        };
        assert!(validate_load_segment(&phdr, 0x2000).is_ok());
    }

    /// Build a tiny one-segment ELF image: header + one PT_LOAD phdr + 4
    /// bytes of code, the segment mapped at page-aligned 0x1000.
    fn build_fake_executable() -> alloc::vec::Vec<u8> {
        let phdr_off = ElfHeader::SIZE as u32;
        let seg_off = phdr_off + ProgramHeader::SIZE as u32;
        let mut image = alloc::vec::Vec::new();
        image.extend_from_slice(&header_bytes(phdr_off, 1, 0x1000));
        image.extend_from_slice(&phdr_bytes(PT_LOAD, seg_off, 0x1000, 4, 4, PF_W));
        image.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        image
    }

    #[test]
    fn load_maps_single_segment_executable() {
        let _guard = GLOBAL_FS_TEST_LOCK.lock();
        let mut fs = FakeFileSystem::new();
        fs.seed("prog", build_fake_executable());
        fs::install_file_system(alloc::boxed::Box::new(fs));
        paging::install_allocator(alloc::boxed::Box::new(FakePageAllocator::new(16)));
        paging::install_directory_factory(&FakePageDirectoryFactory);

        let image = load("prog").expect("load succeeds");
        assert_eq!(image.entry, 0x1000);

        let mut out = [0u8; 4];
        assert!(image.directory.read_user(UserAddr(0x1000), &mut out));
        assert_eq!(out, [0xde, 0xad, 0xbe, 0xef]);
        assert!(image.directory.is_writable(UserAddr(0x1000)));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let _guard = GLOBAL_FS_TEST_LOCK.lock();
        let fs = FakeFileSystem::new();
        fs::install_file_system(alloc::boxed::Box::new(fs));
        paging::install_allocator(alloc::boxed::Box::new(FakePageAllocator::new(16)));
        paging::install_directory_factory(&FakePageDirectoryFactory);
        assert_eq!(load("nope").unwrap_err(), ElfError::OpenFailed);
    }
}
