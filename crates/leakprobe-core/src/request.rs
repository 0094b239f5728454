//! Descriptions of allocation requests, for diagnostics.

use std::fmt;

/// An allocation-type request made against a runtime.
///
/// Carried by errors and call logs so a failure names exactly which
/// request came back null.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocRequest {
    /// `allocate(size)`.
    Allocate {
        /// Requested size in bytes.
        size: usize,
    },
    /// `allocate_aligned(size, align)`.
    Aligned {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },
    /// `allocate_copy_of(s)`.
    CopyOf {
        /// Length of the source string in bytes.
        len: usize,
    },
    /// `allocate_bounded_copy_of(s, max_len)`.
    BoundedCopyOf {
        /// Length of the source string in bytes.
        len: usize,
        /// Maximum number of bytes to copy.
        max_len: usize,
    },
    /// `reallocate(handle, new_size)`.
    Reallocate {
        /// New size in bytes.
        new_size: usize,
    },
    /// `reallocate_array(handle, count, elem_size)`.
    ReallocateArray {
        /// Number of elements.
        count: usize,
        /// Size of one element in bytes.
        elem_size: usize,
    },
}

impl AllocRequest {
    /// Bytes the request asks for, or `None` if the size overflows.
    pub fn requested_bytes(&self) -> Option<usize> {
        match *self {
            Self::Allocate { size } | Self::Aligned { size, .. } => Some(size),
            Self::CopyOf { len } => len.checked_add(1),
            Self::BoundedCopyOf { len, max_len } => len.min(max_len).checked_add(1),
            Self::Reallocate { new_size } => Some(new_size),
            Self::ReallocateArray { count, elem_size } => count.checked_mul(elem_size),
        }
    }

    /// Whether the request resizes an existing region.
    pub fn is_reallocation(&self) -> bool {
        matches!(
            self,
            Self::Reallocate { .. } | Self::ReallocateArray { .. }
        )
    }
}

impl fmt::Display for AllocRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocate { size } => write!(f, "allocate({size})"),
            Self::Aligned { size, align } => write!(f, "allocate_aligned({size}, {align})"),
            Self::CopyOf { len } => write!(f, "allocate_copy_of(<{len} bytes>)"),
            Self::BoundedCopyOf { len, max_len } => {
                write!(f, "allocate_bounded_copy_of(<{len} bytes>, {max_len})")
            }
            Self::Reallocate { new_size } => write!(f, "reallocate({new_size})"),
            Self::ReallocateArray { count, elem_size } => {
                write!(f, "reallocate_array({count}, {elem_size})")
            }
        }
    }
}
