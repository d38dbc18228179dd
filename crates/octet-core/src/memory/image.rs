//! Fixed-capacity byte image backing both regions.

use thiserror::Error;

use super::access::{checked_range, AccessWidth};
use super::map::{LayoutError, MemoryLayout, PAGE_BYTES};
use crate::FaultCode;

/// Raw image access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access touched bytes past the end of the image.
    #[error("access of {len} bytes at offset {offset:#x} exceeds image size {size:#x}")]
    OutOfBounds {
        /// First byte of the access.
        offset: u32,
        /// Number of bytes requested.
        len: usize,
        /// Total image size.
        size: usize,
    },
    /// The image was created at its maximum capacity and cannot grow.
    #[error("growth by {requested} bytes refused: image is fixed at {capacity} bytes")]
    GrowthRefused {
        /// Additional bytes requested.
        requested: usize,
        /// Fixed capacity of the image.
        capacity: usize,
    },
}

impl MemoryError {
    /// Maps the failure to the fault surfaced by `step`.
    #[must_use]
    pub const fn fault_code(self) -> FaultCode {
        match self {
            Self::OutOfBounds { .. } | Self::GrowthRefused { .. } => FaultCode::OutOfBoundsAccess,
        }
    }
}

impl From<MemoryError> for FaultCode {
    fn from(value: MemoryError) -> Self {
        value.fault_code()
    }
}

/// Flat memory image: code region at offset 0, data region right after it.
///
/// The backing store is allocated once at exactly `code_len + data_len`
/// bytes; region boundaries never move and the image never grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    layout: MemoryLayout,
    bytes: Box<[u8]>,
}

impl MemoryImage {
    /// Allocates a zeroed image sized exactly to `layout`.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] when the layout fails validation.
    pub fn new(layout: MemoryLayout) -> Result<Self, LayoutError> {
        layout.validate()?;
        Ok(Self {
            layout,
            bytes: vec![0; layout.total_len()].into_boxed_slice(),
        })
    }

    /// Allocates an image for a host that sized its allocation independently.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::CapacityMismatch`] when `capacity` differs from
    /// the sum of the declared regions, or any other [`LayoutError`] from
    /// layout validation.
    pub fn with_capacity(layout: MemoryLayout, capacity: usize) -> Result<Self, LayoutError> {
        layout.validate()?;
        let expected = layout.total_len();
        if capacity != expected {
            return Err(LayoutError::CapacityMismatch {
                expected,
                actual: capacity,
            });
        }
        Self::new(layout)
    }

    /// Same as [`Self::with_capacity`] with the allocation given in pages.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::CapacityMismatch`] when `pages` does not cover
    /// the declared regions exactly.
    pub fn with_capacity_pages(layout: MemoryLayout, pages: u32) -> Result<Self, LayoutError> {
        let capacity = usize::try_from(u64::from(pages) * u64::from(PAGE_BYTES))
            .unwrap_or(usize::MAX);
        Self::with_capacity(layout, capacity)
    }

    /// Region layout the image was built with.
    #[must_use]
    pub const fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Total image size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`: validated layouts have two non-empty regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Requests additional capacity. Only a zero-byte request succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::GrowthRefused`] for any positive request.
    pub fn grow(&mut self, additional: usize) -> Result<(), MemoryError> {
        if additional == 0 {
            return Ok(());
        }
        Err(MemoryError::GrowthRefused {
            requested: additional,
            capacity: self.bytes.len(),
        })
    }

    /// Reads a little-endian value of `width` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `offset + width` exceeds the
    /// image size.
    pub fn read(&self, offset: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        let bytes = self.read_bytes(offset, width.bytes())?;
        let mut word = [0_u8; 4];
        word[..bytes.len()].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(word))
    }

    /// Writes the low `width` bytes of `value` in little-endian order.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when `offset + width` exceeds the
    /// image size. Nothing is written in that case.
    pub fn write(&mut self, offset: u32, width: AccessWidth, value: u32) -> Result<(), MemoryError> {
        let word = value.to_le_bytes();
        self.write_bytes(offset, &word[..width.bytes()])
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] past the image end.
    pub fn read_u8(&self, offset: u32) -> Result<u8, MemoryError> {
        Ok(self.read_bytes(offset, 1)?[0])
    }

    /// Borrows `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when the range exceeds the image.
    pub fn read_bytes(&self, offset: u32, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.range(offset, len)?;
        Ok(&self.bytes[range])
    }

    /// Copies `bytes` into the image starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] when the range exceeds the image.
    /// Nothing is written in that case.
    pub fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(offset, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Code-region bytes.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.bytes[..self.layout.code_len() as usize]
    }

    /// Data-region bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.bytes[self.layout.code_len() as usize..]
    }

    /// The whole image.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, MemoryError> {
        checked_range(offset, len, self.bytes.len()).ok_or(MemoryError::OutOfBounds {
            offset,
            len,
            size: self.bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryError, MemoryImage};
    use crate::memory::{AccessWidth, LayoutError, MemoryLayout, PAGE_BYTES};
    use crate::FaultCode;

    fn small_image() -> MemoryImage {
        MemoryImage::new(MemoryLayout::new(16, 16).expect("valid layout")).expect("valid image")
    }

    #[test]
    fn image_is_sized_to_exactly_the_declared_regions() {
        let image = MemoryImage::new(MemoryLayout::default()).expect("default image");
        assert_eq!(image.len(), 18 * PAGE_BYTES as usize);
        assert_eq!(image.code().len(), 16 * PAGE_BYTES as usize);
        assert_eq!(image.data().len(), 2 * PAGE_BYTES as usize);
        assert!(image.as_bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn seventeen_page_allocation_is_rejected_for_eighteen_declared_pages() {
        let err = MemoryImage::with_capacity_pages(MemoryLayout::default(), 17)
            .expect_err("mismatched capacity must be rejected");
        assert_eq!(
            err,
            LayoutError::CapacityMismatch {
                expected: 18 * PAGE_BYTES as usize,
                actual: 17 * PAGE_BYTES as usize,
            }
        );
        assert!(MemoryImage::with_capacity_pages(MemoryLayout::default(), 18).is_ok());
    }

    #[test]
    fn growth_beyond_initial_capacity_fails() {
        let mut image = small_image();
        assert_eq!(image.grow(0), Ok(()));
        assert_eq!(
            image.grow(1),
            Err(MemoryError::GrowthRefused {
                requested: 1,
                capacity: 32
            })
        );
        assert_eq!(image.len(), 32);
    }

    #[test]
    fn multi_byte_values_are_little_endian() {
        let mut image = small_image();
        image
            .write(20, AccessWidth::Word, 0x1122_3344)
            .expect("in bounds");
        assert_eq!(image.read_bytes(20, 4), Ok(&[0x44, 0x33, 0x22, 0x11][..]));
        assert_eq!(image.read(20, AccessWidth::Half), Ok(0x3344));
        assert_eq!(image.read(20, AccessWidth::Byte), Ok(0x44));
        assert_eq!(image.read(20, AccessWidth::Word), Ok(0x1122_3344));
    }

    #[test]
    fn write_truncates_value_to_width() {
        let mut image = small_image();
        image
            .write(0, AccessWidth::Byte, 0xABCD)
            .expect("in bounds");
        assert_eq!(image.read(0, AccessWidth::Half), Ok(0x00CD));
    }

    #[test]
    fn straddling_write_fails_without_partial_effect() {
        let mut image = small_image();
        let err = image
            .write(30, AccessWidth::Word, u32::MAX)
            .expect_err("straddles the end");
        assert_eq!(
            err,
            MemoryError::OutOfBounds {
                offset: 30,
                len: 4,
                size: 32
            }
        );
        assert_eq!(err.fault_code(), FaultCode::OutOfBoundsAccess);
        assert_eq!(image.read(30, AccessWidth::Half), Ok(0));
    }

    #[test]
    fn reads_past_the_end_never_wrap() {
        let image = small_image();
        assert!(image.read_u8(32).is_err());
        assert!(image.read(u32::MAX, AccessWidth::Byte).is_err());
        assert_eq!(
            FaultCode::from(image.read_u8(40).expect_err("past end")),
            FaultCode::OutOfBoundsAccess
        );
    }
}
