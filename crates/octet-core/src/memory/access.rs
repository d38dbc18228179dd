//! Access widths and bounds policy shared by the image and the engine.

use core::ops::Range;

use crate::FaultCode;

/// Width of a single memory access. Multi-byte values are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessWidth {
    /// One byte.
    Byte = 1,
    /// Two bytes.
    Half = 2,
    /// Four bytes.
    Word = 4,
}

impl AccessWidth {
    /// Number of bytes covered by this width.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Converts a byte count into a supported width.
    #[must_use]
    pub const fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Half),
            4 => Some(Self::Word),
            _ => None,
        }
    }

    /// Value mask for this width.
    #[must_use]
    pub const fn mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Half => 0xFFFF,
            Self::Word => u32::MAX,
        }
    }
}

/// Returns the byte range touched by an access, or `None` when any byte of
/// it lies past `size`. Never clamps and never wraps.
#[must_use]
pub fn checked_range(offset: u32, len: usize, size: usize) -> Option<Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(len)?;
    (end <= size).then_some(start..end)
}

/// Validates that an access of `width` at `offset` fits inside `size` bytes.
///
/// # Errors
///
/// Returns [`FaultCode::OutOfBoundsAccess`] when `offset + width` exceeds
/// `size`.
pub fn validate_access(offset: u32, width: AccessWidth, size: usize) -> Result<(), FaultCode> {
    checked_range(offset, width.bytes(), size)
        .map(|_| ())
        .ok_or(FaultCode::OutOfBoundsAccess)
}
