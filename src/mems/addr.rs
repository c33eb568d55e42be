/// Fallback when the platform does not report a page size.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// A physical address split at a page boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSplit {
    /// Page-aligned base, used as the mapping offset.
    pub base: u64,
    /// Byte offset of the address inside the page.
    pub offset: usize,
}

impl PageSplit {
    /// `page_size` must be a power of two.
    pub fn new(address: u64, page_size: u64) -> Self {
        debug_assert!(page_size.is_power_of_two());
        let base = address & !(page_size - 1);
        Self {
            base,
            offset: (address - base) as usize,
        }
    }

    pub fn address(&self) -> u64 {
        self.base + self.offset as u64
    }
}

/// Page size of the running system.
pub fn system_page_size() -> u64 {
    match nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 && (size as u64).is_power_of_two() => size as u64,
        other => {
            log::warn!("sysconf(PAGE_SIZE) returned {other:?}, assuming {DEFAULT_PAGE_SIZE}");
            DEFAULT_PAGE_SIZE
        }
    }
}
