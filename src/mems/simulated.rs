//! In-process stand-in for the physical memory device.
//!
//! Memory is a set of non-overlapping segments. Pages outside every segment
//! refuse to map, the way `/dev/mem` refuses ranges the kernel does not
//! expose, and a segment ending mid-page yields a truncated mapping.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::err::{AccessError, MemoryError};
use crate::mems::addr::DEFAULT_PAGE_SIZE;
use crate::mems::mapping::{MappedPage, PhysicalMemory};
use crate::value::AccessWidth;

#[derive(Debug)]
struct Segment {
    base: u64,
    memory: Box<[u8]>,
}

impl Segment {
    fn end(&self) -> u64 {
        self.base + self.memory.len() as u64
    }

    fn contains(&self, address: u64, size: usize) -> bool {
        address >= self.base && address.saturating_add(size as u64) <= self.end()
    }
}

#[derive(Debug)]
pub struct SimulatedMemory {
    page_size: u64,
    segments: RefCell<BTreeMap<u64, Segment>>, // sorted by base address
    live_mappings: Cell<usize>,
    total_mappings: Cell<usize>,
}

impl Default for SimulatedMemory {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl SimulatedMemory {
    /// `page_size` must be a non-zero power of two.
    pub fn new(page_size: u64) -> Result<Self, MemoryError> {
        if !page_size.is_power_of_two() {
            return Err(MemoryError::invalid_size(page_size as usize));
        }
        Ok(Self::with_page_size(page_size))
    }

    fn with_page_size(page_size: u64) -> Self {
        Self {
            page_size,
            segments: RefCell::new(BTreeMap::new()),
            live_mappings: Cell::new(0),
            total_mappings: Cell::new(0),
        }
    }

    /// Backs `[base, base + size)` with zeroed memory.
    pub fn add_segment(&mut self, base: u64, size: usize) -> Result<(), MemoryError> {
        if size == 0 {
            return Err(MemoryError::invalid_size(size));
        }
        let end = base
            .checked_add(size as u64)
            .ok_or_else(|| MemoryError::invalid_size(size))?;

        let segments = self.segments.get_mut();
        if let Some((_, next)) = segments.range(base..).next() {
            if next.base < end {
                return Err(MemoryError::region_overlap(base, end));
            }
        }
        if let Some((_, prev)) = segments.range(..base).next_back() {
            if prev.end() > base {
                return Err(MemoryError::region_overlap(base, end));
            }
        }

        segments.insert(
            base,
            Segment {
                base,
                memory: vec![0; size].into_boxed_slice(),
            },
        );
        Ok(())
    }

    /// Write path independent of any mapping.
    pub fn write_bytes(&self, address: u64, data: &[u8]) -> Result<(), MemoryError> {
        if data.is_empty() {
            return Ok(());
        }
        let mut segments = self.segments.borrow_mut();
        let segment = segments
            .range_mut(..=address)
            .next_back()
            .map(|(_, seg)| seg)
            .filter(|seg| seg.contains(address, data.len()))
            .ok_or_else(|| MemoryError::unmapped(address, data.len()))?;

        let offset = (address - segment.base) as usize;
        segment.memory[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn write_u32(&self, address: u64, value: u32) -> Result<(), MemoryError> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Mappings currently held by a live [`SimulatedPage`].
    pub fn live_mappings(&self) -> usize {
        self.live_mappings.get()
    }

    /// Mappings created since construction.
    pub fn total_mappings(&self) -> usize {
        self.total_mappings.get()
    }
}

impl PhysicalMemory for SimulatedMemory {
    type Page<'a>
        = SimulatedPage<'a>
    where
        Self: 'a;

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn map_page(&self, base: u64) -> Result<SimulatedPage<'_>, AccessError> {
        if base % self.page_size != 0 {
            return Err(AccessError::map(base, "base is not page aligned"));
        }

        let segments = self.segments.borrow();
        let (seg_base, seg_end) = segments
            .range(..=base)
            .next_back()
            .map(|(_, seg)| (seg.base, seg.end()))
            .filter(|&(_, end)| base < end)
            .ok_or_else(|| AccessError::map(base, "no memory backs this page"))?;

        let start = (base - seg_base) as usize;
        let len = (seg_end - base).min(self.page_size) as usize;
        let bytes = segments[&seg_base].memory[start..start + len].to_vec();

        self.live_mappings.set(self.live_mappings.get() + 1);
        self.total_mappings.set(self.total_mappings.get() + 1);
        log::trace!("Simulated map of {len:#x} bytes at {base:#x}");

        Ok(SimulatedPage {
            memory: self,
            base,
            bytes,
        })
    }
}

/// Snapshot of one simulated page, released on drop.
#[derive(Debug)]
pub struct SimulatedPage<'a> {
    memory: &'a SimulatedMemory,
    base: u64,
    bytes: Vec<u8>,
}

impl MappedPage for SimulatedPage<'_> {
    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    unsafe fn load(&self, offset: usize, width: AccessWidth) -> u64 {
        width.decode_le(&self.bytes[offset..offset + width.bytes()])
    }
}

impl Drop for SimulatedPage<'_> {
    fn drop(&mut self) {
        let live = &self.memory.live_mappings;
        live.set(live.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_must_be_power_of_two() {
        assert_eq!(
            SimulatedMemory::new(0x1800).unwrap_err(),
            MemoryError::invalid_size(0x1800)
        );
        assert_eq!(
            SimulatedMemory::new(0).unwrap_err(),
            MemoryError::invalid_size(0)
        );
        assert_eq!(SimulatedMemory::new(0x4000).unwrap().page_size(), 0x4000);
        assert_eq!(SimulatedMemory::default().page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_overlap_detection() {
        let mut memory = SimulatedMemory::default();
        memory.add_segment(0x1000, 0x1000).unwrap();

        assert_eq!(
            memory.add_segment(0x1800, 0x1000),
            Err(MemoryError::region_overlap(0x1800, 0x2800))
        );
        assert!(memory.add_segment(0x0, 0x1001).is_err());
        assert!(memory.add_segment(0x2000, 0x1000).is_ok());
        assert_eq!(
            memory.add_segment(0x4000, 0),
            Err(MemoryError::invalid_size(0))
        );
    }

    #[test]
    fn test_write_outside_segment() {
        let mut memory = SimulatedMemory::default();
        memory.add_segment(0x1000, 0x1000).unwrap();

        assert!(memory.write_u32(0x1ffc, 1).is_ok());
        assert_eq!(
            memory.write_u32(0x1ffe, 1),
            Err(MemoryError::unmapped(0x1ffe, 4))
        );
        assert!(memory.write_u32(0x3000, 1).is_err());
    }

    #[test]
    fn test_map_tracks_live_pages() {
        let mut memory = SimulatedMemory::default();
        memory.add_segment(0x1000, 0x2000).unwrap();
        memory.write_u32(0x2010, 0xcafe).unwrap();

        {
            let page = memory.map_page(0x2000).unwrap();
            assert_eq!(memory.live_mappings(), 1);
            assert_eq!(page.len(), 0x1000);
            assert_eq!(page.read(0x10, AccessWidth::Word).unwrap(), 0xcafe);
        }
        assert_eq!(memory.live_mappings(), 0);
        assert_eq!(memory.total_mappings(), 1);
    }

    #[test]
    fn test_map_rejects_unbacked_page() {
        let mut memory = SimulatedMemory::default();
        memory.add_segment(0x1000, 0x1000).unwrap();

        assert!(matches!(
            memory.map_page(0x2000),
            Err(AccessError::Map { address: 0x2000, .. })
        ));
        assert!(matches!(memory.map_page(0x1004), Err(AccessError::Map { .. })));
        assert_eq!(memory.live_mappings(), 0);
        assert_eq!(memory.total_mappings(), 0);
    }

    #[test]
    fn test_truncated_page() {
        let mut memory = SimulatedMemory::default();
        memory.add_segment(0x1000, 0x802).unwrap();

        let page = memory.map_page(0x1000).unwrap();
        assert_eq!(page.len(), 0x802);
        assert!(matches!(
            page.read(0x800, AccessWidth::Word),
            Err(AccessError::ShortRead {
                address: 0x1800,
                width: 4,
                available: 2
            })
        ));
        assert_eq!(page.read(0x800, AccessWidth::Half).unwrap(), 0);
        assert!(matches!(
            page.read(0x7ff, AccessWidth::Word),
            Err(AccessError::ShortRead { available: 3, .. })
        ));
        assert_eq!(page.read(0x7fe, AccessWidth::Word).unwrap(), 0);
    }

    #[test]
    fn test_unaligned_read_gathers_bytes() {
        let mut memory = SimulatedMemory::default();
        memory.add_segment(0x1000, 0x1000).unwrap();
        memory
            .write_bytes(0x1003, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88])
            .unwrap();

        let page = memory.map_page(0x1000).unwrap();
        assert_eq!(page.read(3, AccessWidth::Half).unwrap(), 0x2211);
        assert_eq!(page.read(3, AccessWidth::Word).unwrap(), 0x44332211);
        assert_eq!(page.read(3, AccessWidth::Double).unwrap(), 0x8877665544332211);
        assert!(matches!(
            page.read_aligned(3, AccessWidth::Word),
            Err(AccessError::Misaligned { address: 0x1003, width: 4 })
        ));
        assert!(matches!(
            page.read_aligned(0xffe, AccessWidth::Word),
            Err(AccessError::ShortRead { available: 2, .. })
        ));
    }
}
