use std::fmt;

use crate::err::AccessError;

/// Size of a single register access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AccessWidth {
    Byte,
    Half,
    #[default]
    Word,
    Double,
}

impl AccessWidth {
    pub const fn bytes(self) -> usize {
        match self {
            AccessWidth::Byte => 1,
            AccessWidth::Half => 2,
            AccessWidth::Word => 4,
            AccessWidth::Double => 8,
        }
    }

    /// Whether `address` is naturally aligned for this width.
    pub const fn is_aligned(self, address: u64) -> bool {
        address & (self.bytes() as u64 - 1) == 0
    }

    /// Decodes the first `self.bytes()` bytes of `bytes` little-endian.
    ///
    /// Panics if `bytes` is shorter than the width.
    pub fn decode_le(self, bytes: &[u8]) -> u64 {
        match self {
            AccessWidth::Byte => u64::from(bytes[0]),
            AccessWidth::Half => u64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
            AccessWidth::Word => u64::from(u32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ])),
            AccessWidth::Double => u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        }
    }
}

impl TryFrom<usize> for AccessWidth {
    type Error = AccessError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        match size {
            1 => Ok(AccessWidth::Byte),
            2 => Ok(AccessWidth::Half),
            4 => Ok(AccessWidth::Word),
            8 => Ok(AccessWidth::Double),
            _ => Err(AccessError::InvalidWidth { size }),
        }
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-byte", self.bytes())
    }
}

/// A value read from a register, together with the width it was read at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterValue {
    raw: u64,
    width: AccessWidth,
}

impl RegisterValue {
    pub const fn new(raw: u64, width: AccessWidth) -> Self {
        Self { raw, width }
    }

    pub const fn raw(&self) -> u64 {
        self.raw
    }

    pub const fn width(&self) -> AccessWidth {
        self.width
    }
}

impl From<RegisterValue> for u64 {
    fn from(value: RegisterValue) -> Self {
        value.raw
    }
}

// Plain `hex()` rendering: lower-case, 0x prefix, no padding.
impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.raw)
    }
}
