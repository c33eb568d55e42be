use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single register access.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Cannot open device {}: {source}", .path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot map page at physical address 0x{address:x}: {reason}")]
    Map { address: u64, reason: String },

    #[error(
        "Short read at physical address 0x{address:x}: {width}-byte access but only {available} bytes mapped"
    )]
    ShortRead {
        address: u64,
        width: usize,
        available: usize,
    },

    #[error("Invalid alignment: address 0x{address:x} not aligned for {width}-byte access")]
    Misaligned { address: u64, width: usize },

    #[error("Invalid access size: {size} bytes (must be 1, 2, 4, or 8)")]
    InvalidWidth { size: usize },
}

impl AccessError {
    pub fn device_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DeviceOpen {
            path: path.into(),
            source,
        }
    }

    pub fn map(address: u64, reason: impl Into<String>) -> Self {
        Self::Map {
            address,
            reason: reason.into(),
        }
    }

    pub fn short_read(address: u64, width: usize, available: usize) -> Self {
        Self::ShortRead {
            address,
            width,
            available,
        }
    }

    pub fn misaligned(address: u64, width: usize) -> Self {
        Self::Misaligned { address, width }
    }
}

/// Errors raised while building a simulated backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Memory region overlap: 0x{start:x}-0x{end:x} overlaps with existing segment")]
    RegionOverlap { start: u64, end: u64 },

    #[error("Invalid size: {size} bytes is invalid for this operation")]
    InvalidSize { size: usize },

    #[error("Address range 0x{start:x}-0x{end:x} not backed by any segment")]
    Unmapped { start: u64, end: u64 },
}

impl MemoryError {
    pub fn region_overlap(start: u64, end: u64) -> Self {
        Self::RegionOverlap { start, end }
    }

    pub fn invalid_size(size: usize) -> Self {
        Self::InvalidSize { size }
    }

    pub fn unmapped(address: u64, size: usize) -> Self {
        Self::Unmapped {
            start: address,
            end: address.saturating_add(size as u64).saturating_sub(1),
        }
    }
}
