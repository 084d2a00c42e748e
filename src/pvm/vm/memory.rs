//! Sparse paged memory with per-page access control.
//!
//! The 32-bit address space is split into pages of [`PAGE_SIZE`] bytes. Only pages that carry
//! an access entry are stored; everything else is inaccessible. Address arithmetic wraps at
//! 2^32, so a range that runs past the top of memory continues at page 0.

use crate::pvm::constants::{PAGE_COUNT, PAGE_SIZE};
use pvm_derive::Error;
use std::collections::HashMap;

/// Access kind of a single page.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PageAccess {
    /// Not mapped: every access faults.
    #[default]
    None,
    /// Loads allowed, stores fault.
    Read,
    /// Loads and stores allowed.
    Write,
}

/// A checked access touched a page it was not allowed to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("memory fault at page address {address:#x}")]
pub struct MemoryFault {
    /// Page-aligned address of the first offending page.
    pub address: u32,
}

/// Bounds of the bump-allocated heap: `start <= pointer <= end`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Heap {
    pub start: u32,
    pub pointer: u32,
    pub end: u32,
}

#[derive(Clone, Debug)]
struct Page {
    access: PageAccess,
    data: Box<[u8]>,
}

impl Page {
    fn zeroed(access: PageAccess) -> Self {
        Self {
            access,
            data: vec![0u8; PAGE_SIZE as usize].into_boxed_slice(),
        }
    }
}

/// Machine memory: mapped pages plus the heap bounds.
///
/// `Clone` is a deep copy, so a clone serves as an independent checkpoint.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    pages: HashMap<u32, Page>,
    heap: Heap,
}

/// Page numbers touched by `[address, address + len)`, wrapping at the top of memory.
fn pages_in_range(address: u32, len: usize) -> impl Iterator<Item = u32> {
    let first = address / PAGE_SIZE;
    let count = if len == 0 {
        0
    } else {
        let offset = (address % PAGE_SIZE) as u64;
        (offset + len as u64).div_ceil(PAGE_SIZE as u64).min(PAGE_COUNT as u64) as u32
    };
    (0..count).map(move |i| (first + i) % PAGE_COUNT)
}

#[inline(always)]
fn page_address(page: u32) -> u32 {
    page.wrapping_mul(PAGE_SIZE)
}

impl Memory {
    /// Creates an empty memory with no mapped pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the access kind of page number `page`.
    pub fn access(&self, page: u32) -> PageAccess {
        self.pages
            .get(&page)
            .map_or(PageAccess::None, |p| p.access)
    }

    /// Changes the access kind of page number `page`.
    ///
    /// A page that becomes accessible from [`PageAccess::None`] starts zero-filled; a page that
    /// was already mapped keeps its content. Setting [`PageAccess::None`] discards the page.
    pub fn set_access(&mut self, page: u32, access: PageAccess) {
        let page = page % PAGE_COUNT;
        match access {
            PageAccess::None => {
                self.pages.remove(&page);
            }
            _ => {
                self.pages
                    .entry(page)
                    .and_modify(|p| p.access = access)
                    .or_insert_with(|| Page::zeroed(access));
            }
        }
    }

    /// Maps every page touched by `[address, address + len)` with `access`.
    pub fn map_range(&mut self, address: u32, len: usize, access: PageAccess) {
        for page in pages_in_range(address, len) {
            self.set_access(page, access);
        }
    }

    /// Number of mapped pages.
    pub fn mapped_pages(&self) -> usize {
        self.pages.len()
    }

    /// Page-aligned address of the first page in the range that is not mapped.
    pub fn first_unreadable(&self, address: u32, len: usize) -> Option<u32> {
        pages_in_range(address, len)
            .find(|page| !self.pages.contains_key(page))
            .map(page_address)
    }

    /// Page-aligned address of the first page in the range that is not writable.
    pub fn first_unwriteable(&self, address: u32, len: usize) -> Option<u32> {
        pages_in_range(address, len)
            .find(|&page| self.access(page) != PageAccess::Write)
            .map(page_address)
    }

    pub fn can_read(&self, address: u32, len: usize) -> bool {
        self.first_unreadable(address, len).is_none()
    }

    pub fn can_write(&self, address: u32, len: usize) -> bool {
        self.first_unwriteable(address, len).is_none()
    }

    /// Reads `buf.len()` bytes starting at `address`.
    ///
    /// Fails without touching `buf` if any page in the range is unmapped.
    pub fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), MemoryFault> {
        if let Some(fault) = self.first_unreadable(address, buf.len()) {
            return Err(MemoryFault { address: fault });
        }
        let mut address = address;
        let mut done = 0;
        while done < buf.len() {
            let offset = (address % PAGE_SIZE) as usize;
            let n = (PAGE_SIZE as usize - offset).min(buf.len() - done);
            // range was checked above, so every page is present
            if let Some(page) = self.pages.get(&(address / PAGE_SIZE)) {
                buf[done..done + n].copy_from_slice(&page.data[offset..offset + n]);
            }
            done += n;
            address = address.wrapping_add(n as u32);
        }
        Ok(())
    }

    /// Reads `len` bytes starting at `address` into a new buffer.
    pub fn read_vec(&self, address: u32, len: usize) -> Result<Vec<u8>, MemoryFault> {
        let mut out = vec![0u8; len];
        self.read(address, &mut out)?;
        Ok(out)
    }

    /// Writes `bytes` starting at `address`.
    ///
    /// Either the whole range is writable and every byte lands, or nothing is written.
    pub fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), MemoryFault> {
        if let Some(fault) = self.first_unwriteable(address, bytes.len()) {
            return Err(MemoryFault { address: fault });
        }
        self.copy_in(address, bytes);
        Ok(())
    }

    /// Copies `bytes` into mapped pages regardless of their access kind.
    ///
    /// Used to seed read-only zones; fails if a page in the range is unmapped.
    pub fn fill(&mut self, address: u32, bytes: &[u8]) -> Result<(), MemoryFault> {
        if let Some(fault) = self.first_unreadable(address, bytes.len()) {
            return Err(MemoryFault { address: fault });
        }
        self.copy_in(address, bytes);
        Ok(())
    }

    fn copy_in(&mut self, address: u32, bytes: &[u8]) {
        let mut address = address;
        let mut done = 0;
        while done < bytes.len() {
            let offset = (address % PAGE_SIZE) as usize;
            let n = (PAGE_SIZE as usize - offset).min(bytes.len() - done);
            if let Some(page) = self.pages.get_mut(&(address / PAGE_SIZE)) {
                page.data[offset..offset + n].copy_from_slice(&bytes[done..done + n]);
            }
            done += n;
            address = address.wrapping_add(n as u32);
        }
    }

    pub fn heap(&self) -> Heap {
        self.heap
    }

    pub fn set_heap(&mut self, heap: Heap) {
        self.heap = heap;
    }

    /// Bump-allocates `size` bytes on the heap and returns the previous heap pointer.
    ///
    /// When the pointer would reach the heap end, `ceil(size / PAGE_SIZE)` zeroed writable pages
    /// are mapped at the end first. Returns `None`, leaving memory untouched, if the heap would
    /// grow past the top of the address space.
    pub fn sbrk(&mut self, size: u32) -> Option<u32> {
        let Heap { pointer, end, .. } = self.heap;
        let new_pointer = u32::try_from(pointer as u64 + size as u64).ok()?;
        if new_pointer >= end {
            let pages = size.div_ceil(PAGE_SIZE);
            let new_end = u32::try_from(end as u64 + pages as u64 * PAGE_SIZE as u64).ok()?;
            let first = end / PAGE_SIZE;
            for page in first..first + pages {
                self.pages.insert(page, Page::zeroed(PageAccess::Write));
            }
            self.heap.end = new_end;
        }
        self.heap.pointer = new_pointer;
        Some(pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 0x10000;

    fn mem_with(page_access: &[(u32, PageAccess)]) -> Memory {
        let mut mem = Memory::new();
        for &(page, access) in page_access {
            mem.set_access(page, access);
        }
        mem
    }

    #[test]
    fn unmapped_memory_faults() {
        let mem = Memory::new();
        assert!(!mem.can_read(BASE, 1));
        assert_eq!(mem.first_unreadable(BASE + 5, 1), Some(BASE));
        assert_eq!(
            mem.read_vec(BASE + 5, 1),
            Err(MemoryFault { address: BASE })
        );
    }

    #[test]
    fn zero_length_access_always_succeeds() {
        let mut mem = Memory::new();
        assert!(mem.can_read(0xDEAD_BEEF, 0));
        assert!(mem.can_write(0, 0));
        assert_eq!(mem.read_vec(0xFFFF_FFFF, 0).unwrap(), Vec::<u8>::new());
        assert!(mem.write(0x1234, &[]).is_ok());
    }

    #[test]
    fn read_only_page_rejects_writes() {
        let page = BASE / PAGE_SIZE;
        let mut mem = mem_with(&[(page, PageAccess::Read)]);
        assert!(mem.can_read(BASE, 16));
        assert!(!mem.can_write(BASE, 16));
        assert_eq!(mem.write(BASE, &[1]), Err(MemoryFault { address: BASE }));
        assert_eq!(mem.read_vec(BASE, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn write_page_is_readable() {
        let page = BASE / PAGE_SIZE;
        let mut mem = mem_with(&[(page, PageAccess::Write)]);
        mem.write(BASE + 3, &[7, 8, 9]).unwrap();
        assert_eq!(mem.read_vec(BASE + 2, 5).unwrap(), vec![0, 7, 8, 9, 0]);
    }

    #[test]
    fn access_spanning_pages() {
        let page = BASE / PAGE_SIZE;
        let mut mem = mem_with(&[(page, PageAccess::Write), (page + 1, PageAccess::Write)]);
        let boundary = BASE + PAGE_SIZE;
        mem.write(boundary - 2, &[1, 2, 3, 4]).unwrap();
        assert_eq!(mem.read_vec(boundary - 2, 4).unwrap(), vec![1, 2, 3, 4]);
        // third page is missing
        assert_eq!(
            mem.first_unwriteable(boundary + PAGE_SIZE - 1, 2),
            Some(boundary + PAGE_SIZE)
        );
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let page = BASE / PAGE_SIZE;
        let mut mem = mem_with(&[(page, PageAccess::Write), (page + 1, PageAccess::Read)]);
        let boundary = BASE + PAGE_SIZE;
        assert_eq!(
            mem.write(boundary - 2, &[1, 2, 3, 4]),
            Err(MemoryFault { address: boundary })
        );
        assert_eq!(mem.read_vec(boundary - 2, 4).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn range_wraps_at_top_of_memory() {
        let last = PAGE_COUNT - 1;
        let mut mem = mem_with(&[(last, PageAccess::Write), (0, PageAccess::Write)]);
        mem.write(u32::MAX, &[0xAA, 0xBB]).unwrap();
        assert_eq!(mem.read_vec(0, 1).unwrap(), vec![0xBB]);
        assert_eq!(mem.read_vec(u32::MAX, 1).unwrap(), vec![0xAA]);
    }

    #[test]
    fn set_access_keeps_content_and_none_discards() {
        let page = BASE / PAGE_SIZE;
        let mut mem = mem_with(&[(page, PageAccess::Write)]);
        mem.write(BASE, &[5]).unwrap();
        mem.set_access(page, PageAccess::Read);
        assert_eq!(mem.read_vec(BASE, 1).unwrap(), vec![5]);
        mem.set_access(page, PageAccess::None);
        assert!(!mem.can_read(BASE, 1));
        mem.set_access(page, PageAccess::Write);
        assert_eq!(mem.read_vec(BASE, 1).unwrap(), vec![0]);
    }

    #[test]
    fn fill_ignores_write_permission() {
        let page = BASE / PAGE_SIZE;
        let mut mem = mem_with(&[(page, PageAccess::Read)]);
        mem.fill(BASE, b"abc").unwrap();
        assert_eq!(mem.read_vec(BASE, 3).unwrap(), b"abc".to_vec());
    }

    #[test]
    fn sbrk_grows_heap_by_whole_pages() {
        let mut mem = Memory::new();
        let start = 4 * PAGE_SIZE;
        mem.set_heap(Heap {
            start,
            pointer: start,
            end: start,
        });
        assert_eq!(mem.sbrk(10), Some(start));
        assert_eq!(mem.heap().pointer, start + 10);
        assert_eq!(mem.heap().end, start + PAGE_SIZE);
        assert!(mem.can_write(start, PAGE_SIZE as usize));

        // fits in the page already mapped
        assert_eq!(mem.sbrk(100), Some(start + 10));
        assert_eq!(mem.heap().end, start + PAGE_SIZE);

        assert_eq!(mem.sbrk(PAGE_SIZE + 1), Some(start + 110));
        assert_eq!(mem.heap().end, start + 3 * PAGE_SIZE);
        assert_eq!(mem.mapped_pages(), 3);
    }

    #[test]
    fn sbrk_refuses_to_leave_address_space() {
        let mut mem = Memory::new();
        let top = u32::MAX - PAGE_SIZE + 1;
        mem.set_heap(Heap {
            start: top,
            pointer: top,
            end: top,
        });
        assert_eq!(mem.sbrk(PAGE_SIZE), None);
        assert_eq!(mem.heap().pointer, top);
        assert_eq!(mem.mapped_pages(), 0);
    }

    #[test]
    fn clone_is_independent() {
        let page = BASE / PAGE_SIZE;
        let mut mem = mem_with(&[(page, PageAccess::Write)]);
        let snapshot = mem.clone();
        mem.write(BASE, &[1]).unwrap();
        assert_eq!(snapshot.read_vec(BASE, 1).unwrap(), vec![0]);
    }
}
