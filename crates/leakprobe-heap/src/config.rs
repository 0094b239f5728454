//! Tracking heap configuration parameters.

use crate::error::HeapConfigError;

/// Configuration for the tracking heap.
///
/// Controls the synthetic address space, the minimum alignment every
/// region receives, the usable-size rounding, and the capacity limit past
/// which allocation requests return null.
#[derive(Clone, Debug)]
pub struct HeapConfig {
    /// Maximum usable bytes held by live regions at once.
    ///
    /// Default: 64 MiB. Requests that would exceed it return null, which
    /// is how tests provoke out-of-memory without fault injection.
    pub capacity_bytes: usize,

    /// Alignment every region receives, in bytes.
    ///
    /// Default: 16, matching common `malloc` guarantees. Must be a power
    /// of two.
    pub min_alignment: usize,

    /// Usable sizes are rounded up to a multiple of this, in bytes.
    ///
    /// Default: 16. Must be a power of two. Reallocation stays in place
    /// while the new size fits the rounded usable size.
    pub granule: usize,

    /// First address of the synthetic address space.
    ///
    /// Default: `0x1000`. Must be non-zero and a multiple of
    /// `min_alignment`.
    pub base_address: usize,
}

impl HeapConfig {
    /// Default capacity: 64 MiB.
    pub const DEFAULT_CAPACITY_BYTES: usize = 64 * 1024 * 1024;

    /// Default minimum alignment.
    pub const DEFAULT_MIN_ALIGNMENT: usize = 16;

    /// Default usable-size granule.
    pub const DEFAULT_GRANULE: usize = 16;

    /// Default base address.
    pub const DEFAULT_BASE_ADDRESS: usize = 0x1000;

    /// Create a config with the given capacity and defaults elsewhere.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            min_alignment: Self::DEFAULT_MIN_ALIGNMENT,
            granule: Self::DEFAULT_GRANULE,
            base_address: Self::DEFAULT_BASE_ADDRESS,
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), HeapConfigError> {
        if self.capacity_bytes == 0 {
            return Err(HeapConfigError::ZeroCapacity);
        }
        if !self.min_alignment.is_power_of_two() {
            return Err(HeapConfigError::AlignmentNotPowerOfTwo {
                value: self.min_alignment,
            });
        }
        if !self.granule.is_power_of_two() {
            return Err(HeapConfigError::GranuleNotPowerOfTwo {
                value: self.granule,
            });
        }
        if self.base_address == 0 {
            return Err(HeapConfigError::NullBaseAddress);
        }
        if self.base_address % self.min_alignment != 0 {
            return Err(HeapConfigError::MisalignedBaseAddress {
                base: self.base_address,
                align: self.min_alignment,
            });
        }
        Ok(())
    }

    /// Usable size for a request of `size` bytes, or `None` on overflow.
    ///
    /// Zero-byte requests still occupy one granule so every region has a
    /// distinct address.
    pub fn usable_size_for(&self, size: usize) -> Option<usize> {
        round_up(size.max(1), self.granule)
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY_BYTES)
    }
}

/// Round `value` up to a multiple of the power-of-two `align`.
pub(crate) fn round_up(value: usize, align: usize) -> Option<usize> {
    let mask = align - 1;
    Some(value.checked_add(mask)? & !mask)
}
