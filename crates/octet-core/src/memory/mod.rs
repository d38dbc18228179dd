//! Memory model: fixed code/data layout over a single fixed-capacity image.

/// Access widths and bounds policy.
pub mod access;
/// Fixed-capacity image.
pub mod image;
/// Region layout and construction-time validation.
pub mod map;

pub use access::{checked_range, validate_access, AccessWidth};
pub use image::{MemoryError, MemoryImage};
pub use map::{
    LayoutError, MemoryLayout, MemoryRegion, RegionDescriptor, DATA_BANK_BYTES,
    DEFAULT_CODE_PAGES, DEFAULT_DATA_PAGES, MAX_CODE_BYTES, MAX_DATA_BYTES, PAGE_BYTES,
};
