//! Heap-specific error types.

use std::error::Error;
use std::fmt;

/// Errors detected by [`HeapConfig::validate`](crate::HeapConfig::validate).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapConfigError {
    /// `capacity_bytes` is zero.
    ZeroCapacity,
    /// `min_alignment` is not a power of two.
    AlignmentNotPowerOfTwo {
        /// The configured alignment.
        value: usize,
    },
    /// `granule` is not a power of two.
    GranuleNotPowerOfTwo {
        /// The configured granule.
        value: usize,
    },
    /// `base_address` is zero, which would make the first region null.
    NullBaseAddress,
    /// `base_address` is not a multiple of `min_alignment`.
    MisalignedBaseAddress {
        /// The configured base address.
        base: usize,
        /// The configured minimum alignment.
        align: usize,
    },
}

impl fmt::Display for HeapConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "heap capacity must be at least 1 byte"),
            Self::AlignmentNotPowerOfTwo { value } => {
                write!(f, "min_alignment {value} is not a power of two")
            }
            Self::GranuleNotPowerOfTwo { value } => {
                write!(f, "granule {value} is not a power of two")
            }
            Self::NullBaseAddress => write!(f, "base_address must be non-zero"),
            Self::MisalignedBaseAddress { base, align } => {
                write!(f, "base_address {base:#x} is not aligned to {align}")
            }
        }
    }
}

impl Error for HeapConfigError {}
