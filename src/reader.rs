//! Register reads against a physical memory backend.
//!
//! Every read maps the page holding the address, performs one load of the
//! configured width at the in-page offset and drops the mapping again.
//! An address that is not aligned for the width is read byte by byte.
//! There are no retries: a failed open, map or read is reported as is.
//!
//! Reads go straight to hardware. A register that acknowledges or pops a
//! FIFO on read will do so here as well.

use std::path::Path;

use crate::err::AccessError;
use crate::mems::{DevMem, MappedPage, PageSplit, PhysicalMemory};
use crate::value::{AccessWidth, RegisterValue};

/// Result of reading one address out of a list.
#[derive(Debug)]
pub struct ReadOutcome {
    pub address: u64,
    pub result: Result<RegisterValue, AccessError>,
}

#[derive(Debug)]
pub struct RegisterReader<M> {
    memory: M,
    width: AccessWidth,
    strict_alignment: bool,
}

impl<M: PhysicalMemory> RegisterReader<M> {
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            width: AccessWidth::default(),
            strict_alignment: false,
        }
    }

    pub fn with_width(mut self, width: AccessWidth) -> Self {
        self.width = width;
        self
    }

    /// Refuse addresses not naturally aligned for the access width instead
    /// of reading them byte by byte.
    pub fn with_strict_alignment(mut self, strict: bool) -> Self {
        self.strict_alignment = strict;
        self
    }

    pub fn width(&self) -> AccessWidth {
        self.width
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn read(&self, address: u64) -> Result<RegisterValue, AccessError> {
        self.read_as(address, self.width)
    }

    /// Reads the 32-bit word at `address`, whatever the configured width.
    pub fn read_word(&self, address: u64) -> Result<u32, AccessError> {
        let value = self.read_as(address, AccessWidth::Word)?;
        // A 4-byte load never exceeds u32.
        Ok(value.raw() as u32)
    }

    /// Reads each address independently, in order.
    ///
    /// A failure is tagged with its address and does not stop the
    /// remaining reads. Addresses sharing a page still get one mapping each.
    pub fn read_all<'a>(
        &'a self,
        addresses: &'a [u64],
    ) -> impl Iterator<Item = ReadOutcome> + 'a {
        addresses.iter().map(move |&address| ReadOutcome {
            address,
            result: self.read(address),
        })
    }

    fn read_as(&self, address: u64, width: AccessWidth) -> Result<RegisterValue, AccessError> {
        let split = PageSplit::new(address, self.memory.page_size());
        let page = self.memory.map_page(split.base)?;
        let raw = if self.strict_alignment {
            page.read_aligned(split.offset, width)?
        } else {
            page.read(split.offset, width)?
        };
        log::debug!("Read {width} at {address:#x}: {raw:#x}");
        Ok(RegisterValue::new(raw, width))
    }
}

/// Opens `device_path`, reads the 32-bit word at `address` and closes the
/// device again.
pub fn read_word(device_path: impl AsRef<Path>, address: u64) -> Result<u32, AccessError> {
    RegisterReader::new(DevMem::open(device_path)?).read_word(address)
}
