use crate::err::AccessError;
use crate::value::AccessWidth;

/// A source of physical memory that can be mapped one page at a time.
pub trait PhysicalMemory {
    type Page<'a>: MappedPage
    where
        Self: 'a;

    fn page_size(&self) -> u64;

    /// Maps the page starting at `base`, which must be page aligned.
    /// The mapping is released when the returned guard is dropped.
    fn map_page(&self, base: u64) -> Result<Self::Page<'_>, AccessError>;
}

/// One mapped page of physical memory.
pub trait MappedPage {
    /// Physical address of the first mapped byte.
    fn base(&self) -> u64;

    /// Number of accessible bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Performs a single `width`-sized load at `offset`, decoded little-endian.
    ///
    /// # Safety
    ///
    /// `offset + width.bytes()` must not exceed `self.len()` and
    /// `self.base() + offset` must be aligned to `width`.
    unsafe fn load(&self, offset: usize, width: AccessWidth) -> u64;

    /// Fails with `ShortRead` unless `offset..offset + width` lies inside
    /// the mapping.
    fn check_range(&self, offset: usize, width: AccessWidth) -> Result<(), AccessError> {
        match offset.checked_add(width.bytes()) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(AccessError::short_read(
                self.base() + offset as u64,
                width.bytes(),
                self.len().saturating_sub(offset),
            )),
        }
    }

    /// Bounds-checked read at any offset.
    ///
    /// Aligned offsets get a single `width`-sized load. Unaligned ones are
    /// gathered byte by byte and decoded little-endian.
    fn read(&self, offset: usize, width: AccessWidth) -> Result<u64, AccessError> {
        self.check_range(offset, width)?;
        let address = self.base() + offset as u64;
        if width.is_aligned(address) {
            // SAFETY: range and alignment checked above.
            return Ok(unsafe { self.load(offset, width) });
        }

        let mut bytes = [0u8; 8];
        for (i, byte) in bytes[..width.bytes()].iter_mut().enumerate() {
            // SAFETY: `offset + i` is inside the checked range; byte loads
            // have no alignment requirement.
            *byte = unsafe { self.load(offset + i, AccessWidth::Byte) } as u8;
        }
        Ok(width.decode_le(&bytes))
    }

    /// Like [`MappedPage::read`], but refuses addresses that are not
    /// naturally aligned for `width` instead of splitting the access.
    fn read_aligned(&self, offset: usize, width: AccessWidth) -> Result<u64, AccessError> {
        self.check_range(offset, width)?;
        let address = self.base() + offset as u64;
        if !width.is_aligned(address) {
            return Err(AccessError::misaligned(address, width.bytes()));
        }
        self.read(offset, width)
    }
}
