//! Fixed memory-region layout for the code/data split.

use thiserror::Error;

/// Size in bytes of one allocation page (a WebAssembly linear-memory page).
pub const PAGE_BYTES: u32 = 65_536;
/// Code-region pages in the default layout.
pub const DEFAULT_CODE_PAGES: u32 = 16;
/// Data-region pages in the default layout.
pub const DEFAULT_DATA_PAGES: u32 = 2;
/// Largest code region addressable by 24-bit control-transfer targets.
pub const MAX_CODE_BYTES: u32 = 1 << 24;
/// Largest data region addressable by a `DP:hi:lo` effective address.
pub const MAX_DATA_BYTES: u32 = 1 << 24;
/// Bytes covered by one data bank selected through `DP`.
pub const DATA_BANK_BYTES: u32 = 65_536;

const _: () = assert!(
    DEFAULT_CODE_PAGES * PAGE_BYTES <= MAX_CODE_BYTES,
    "default code region must be addressable"
);
const _: () = assert!(
    DEFAULT_DATA_PAGES * PAGE_BYTES <= MAX_DATA_BYTES,
    "default data region must be addressable"
);

/// Region classification for image offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryRegion {
    /// Program bytes, starting at image offset 0.
    Code,
    /// Read-write working memory, immediately after the code region.
    Data,
}

/// Descriptor of one region inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionDescriptor {
    /// Region classification.
    pub region: MemoryRegion,
    /// Inclusive start offset.
    pub start: u32,
    /// Region length in bytes.
    pub len: u32,
}

impl RegionDescriptor {
    /// Exclusive end offset.
    #[must_use]
    pub const fn end(self) -> u32 {
        self.start + self.len
    }

    /// Returns `true` when `offset` lies inside the region.
    #[must_use]
    pub const fn contains(self, offset: u32) -> bool {
        offset >= self.start && offset < self.end()
    }
}

/// Layout rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// One of the regions was declared with zero length.
    #[error("{region:?} region must not be empty")]
    EmptyRegion {
        /// The empty region.
        region: MemoryRegion,
    },
    /// The code region exceeds the 24-bit jump-target space.
    #[error("code region of {len} bytes exceeds the 16777216-byte addressable limit")]
    CodeRegionTooLarge {
        /// Requested code length.
        len: u32,
    },
    /// The data region exceeds the banked addressing space.
    #[error("data region of {len} bytes exceeds the 16777216-byte addressable limit")]
    DataRegionTooLarge {
        /// Requested data length.
        len: u32,
    },
    /// The host-provided allocation does not match the declared regions.
    #[error("allocation of {actual} bytes does not match declared regions totalling {expected} bytes")]
    CapacityMismatch {
        /// Sum of the declared region lengths.
        expected: usize,
        /// Capacity the host tried to bind.
        actual: usize,
    },
}

/// Static partition of the memory image into code and data regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryLayout {
    code_len: u32,
    data_len: u32,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            code_len: DEFAULT_CODE_PAGES * PAGE_BYTES,
            data_len: DEFAULT_DATA_PAGES * PAGE_BYTES,
        }
    }
}

impl MemoryLayout {
    /// Creates a validated layout from region lengths in bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] when a region is empty or exceeds its
    /// addressable limit.
    pub const fn new(code_len: u32, data_len: u32) -> Result<Self, LayoutError> {
        let layout = Self { code_len, data_len };
        match layout.validate() {
            Ok(()) => Ok(layout),
            Err(err) => Err(err),
        }
    }

    /// Creates a validated layout from region lengths in pages.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] when a region is empty or too large.
    pub const fn from_pages(code_pages: u32, data_pages: u32) -> Result<Self, LayoutError> {
        let Some(code_len) = code_pages.checked_mul(PAGE_BYTES) else {
            return Err(LayoutError::CodeRegionTooLarge { len: u32::MAX });
        };
        let Some(data_len) = data_pages.checked_mul(PAGE_BYTES) else {
            return Err(LayoutError::DataRegionTooLarge { len: u32::MAX });
        };
        Self::new(code_len, data_len)
    }

    /// Re-checks region limits; used for layouts that arrive via deserialization.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] when a region is empty or too large.
    pub const fn validate(self) -> Result<(), LayoutError> {
        if self.code_len == 0 {
            return Err(LayoutError::EmptyRegion {
                region: MemoryRegion::Code,
            });
        }
        if self.data_len == 0 {
            return Err(LayoutError::EmptyRegion {
                region: MemoryRegion::Data,
            });
        }
        if self.code_len > MAX_CODE_BYTES {
            return Err(LayoutError::CodeRegionTooLarge { len: self.code_len });
        }
        if self.data_len > MAX_DATA_BYTES {
            return Err(LayoutError::DataRegionTooLarge { len: self.data_len });
        }
        Ok(())
    }

    /// Code-region length in bytes.
    #[must_use]
    pub const fn code_len(self) -> u32 {
        self.code_len
    }

    /// Data-region length in bytes.
    #[must_use]
    pub const fn data_len(self) -> u32 {
        self.data_len
    }

    /// Exact image size: the sum of both region lengths.
    #[must_use]
    pub const fn total_len(self) -> usize {
        self.code_len as usize + self.data_len as usize
    }

    /// Image offset of the first data byte.
    #[must_use]
    pub const fn data_base(self) -> u32 {
        self.code_len
    }

    /// Descriptor of the code region.
    #[must_use]
    pub const fn code_region(self) -> RegionDescriptor {
        RegionDescriptor {
            region: MemoryRegion::Code,
            start: 0,
            len: self.code_len,
        }
    }

    /// Descriptor of the data region.
    #[must_use]
    pub const fn data_region(self) -> RegionDescriptor {
        RegionDescriptor {
            region: MemoryRegion::Data,
            start: self.code_len,
            len: self.data_len,
        }
    }

    /// Decodes an image offset into its region, or `None` past the image end.
    #[must_use]
    pub const fn region_of(self, offset: u32) -> Option<MemoryRegion> {
        if self.code_region().contains(offset) {
            Some(MemoryRegion::Code)
        } else if self.data_region().contains(offset) {
            Some(MemoryRegion::Data)
        } else {
            None
        }
    }

    /// Returns `true` when `pc` is a valid instruction address.
    #[must_use]
    pub const fn is_code_offset(self, pc: u32) -> bool {
        pc < self.code_len
    }
}
