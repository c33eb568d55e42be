//! Physical memory access through `/dev/mem`.
//!
//! The device is opened read/write with `O_SYNC` so the kernel hands out an
//! uncached mapping, and every page is mapped `PROT_READ`/`MAP_SHARED`.
//!
//! Reading a device register can have side effects on the hardware
//! (acknowledge-on-read status bits, FIFOs that pop on read). Nothing here
//! can detect that: callers must know what lives at the address they read.

use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use nix::fcntl::OFlag;
use nix::libc::{c_void, off_t};
use nix::sys::mman::{self, MapFlags, ProtFlags};

use crate::err::AccessError;
use crate::mems::addr::system_page_size;
use crate::mems::mapping::{MappedPage, PhysicalMemory};
use crate::value::AccessWidth;

pub const DEFAULT_DEVICE: &str = "/dev/mem";

/// An open handle on the physical memory device.
#[derive(Debug)]
pub struct DevMem {
    file: File,
    path: PathBuf,
    page_size: u64,
}

impl DevMem {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AccessError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_SYNC.bits())
            .open(path)
            .map_err(|e| AccessError::device_open(path, e))?;
        let page_size = system_page_size();
        log::info!("Opened {} (page size {page_size:#x})", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PhysicalMemory for DevMem {
    type Page<'a>
        = DevMemPage
    where
        Self: 'a;

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn map_page(&self, base: u64) -> Result<DevMemPage, AccessError> {
        if base % self.page_size != 0 {
            return Err(AccessError::map(base, "base is not page aligned"));
        }
        let offset = off_t::try_from(base)
            .map_err(|_| AccessError::map(base, "offset exceeds off_t range"))?;
        let len = usize::try_from(self.page_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| AccessError::map(base, "invalid page size"))?;

        // SAFETY: fresh mapping chosen by the kernel, never aliased with
        // Rust-owned memory; it is only accessed through volatile loads.
        let ptr = unsafe {
            mman::mmap(
                None,
                len,
                ProtFlags::PROT_READ,
                MapFlags::MAP_SHARED,
                &self.file,
                offset,
            )
        }
        .map_err(|errno| AccessError::map(base, errno.desc()))?;
        log::debug!("Mapped {:#x} bytes at physical {base:#x}", len.get());

        Ok(DevMemPage {
            ptr,
            len: len.get(),
            base,
        })
    }
}

/// A single page of `/dev/mem`, unmapped on drop.
#[derive(Debug)]
pub struct DevMemPage {
    ptr: NonNull<c_void>,
    len: usize,
    base: u64,
}

impl MappedPage for DevMemPage {
    fn base(&self) -> u64 {
        self.base
    }

    fn len(&self) -> usize {
        self.len
    }

    unsafe fn load(&self, offset: usize, width: AccessWidth) -> u64 {
        // SAFETY: the caller keeps `offset..offset + width` inside the
        // mapping and aligned, and the mapping is page aligned.
        unsafe {
            let p = self.ptr.as_ptr().cast::<u8>().add(offset);
            match width {
                AccessWidth::Byte => u64::from(ptr::read_volatile(p)),
                AccessWidth::Half => {
                    u64::from(u16::from_le(ptr::read_volatile(p.cast::<u16>())))
                }
                AccessWidth::Word => {
                    u64::from(u32::from_le(ptr::read_volatile(p.cast::<u32>())))
                }
                AccessWidth::Double => u64::from_le(ptr::read_volatile(p.cast::<u64>())),
            }
        }
    }
}

impl Drop for DevMemPage {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe a mapping created by `map_page` and
        // owned exclusively by this guard.
        match unsafe { mman::munmap(self.ptr, self.len) } {
            Ok(()) => log::debug!("Unmapped page at physical {:#x}", self.base),
            Err(errno) => log::error!("munmap of physical {:#x} failed: {errno}", self.base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::NamedTempFile;

    /// A regular file stands in for the device: it is just as mappable.
    fn backing_file(pages: u64) -> (NamedTempFile, u64) {
        let page_size = system_page_size();
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(page_size * pages).unwrap();
        (file, page_size)
    }

    fn poke(file: &mut NamedTempFile, offset: u64, bytes: &[u8]) {
        file.as_file_mut().seek(SeekFrom::Start(offset)).unwrap();
        file.as_file_mut().write_all(bytes).unwrap();
        file.as_file_mut().flush().unwrap();
    }

    #[test]
    fn test_open_missing_device() {
        let err = DevMem::open("/nonexistent/regpeek/mem").unwrap_err();
        assert!(matches!(err, AccessError::DeviceOpen { .. }));
    }

    #[test]
    fn test_map_and_load() {
        let (mut file, page_size) = backing_file(2);
        poke(&mut file, page_size + 8, &[0xDE, 0xAD, 0xBE, 0xEF]);

        let mem = DevMem::open(file.path()).unwrap();
        assert_eq!(mem.path(), file.path());
        assert_eq!(mem.page_size(), page_size);
        let page = mem.map_page(page_size).unwrap();
        assert_eq!(page.base(), page_size);
        assert_eq!(page.len() as u64, page_size);
        assert_eq!(page.read(8, AccessWidth::Word).unwrap(), 0xEFBEADDE);
        assert_eq!(page.read(8, AccessWidth::Half).unwrap(), 0xADDE);
        assert_eq!(page.read(0, AccessWidth::Double).unwrap(), 0);
    }

    #[test]
    fn test_unaligned_base_rejected() {
        let (file, _) = backing_file(1);
        let mem = DevMem::open(file.path()).unwrap();
        assert!(matches!(
            mem.map_page(0x10),
            Err(AccessError::Map { address: 0x10, .. })
        ));
    }

    #[test]
    fn test_offset_out_of_range_rejected() {
        let (file, page_size) = backing_file(1);
        let mem = DevMem::open(file.path()).unwrap();
        let base = u64::MAX & !(page_size - 1);
        assert!(matches!(mem.map_page(base), Err(AccessError::Map { .. })));
    }

    #[test]
    fn test_read_past_page_end() {
        let (file, page_size) = backing_file(1);
        let mem = DevMem::open(file.path()).unwrap();
        let page = mem.map_page(0).unwrap();
        let err = page.read(page_size as usize, AccessWidth::Word).unwrap_err();
        assert!(matches!(err, AccessError::ShortRead { available: 0, .. }));
    }
}
