//! Protocol configuration, validation, and error types.
//!
//! [`ProtocolConfig`] fixes the shape of the run: how many slots the
//! handle table has, the aligned probe request, the literals copied into
//! string slots, and the sizing policy of the reallocation batch. Every
//! slot range the driver walks is derived from `slot_count`, so one knob
//! scales the whole protocol.

use std::error::Error;
use std::fmt;
use std::ops::{Range, RangeInclusive};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`ProtocolConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `slot_count` is outside `[MIN_SLOT_COUNT, MAX_SLOT_COUNT]`.
    SlotCountOutOfRange {
        /// The configured slot count.
        configured: usize,
    },
    /// The aligned probe alignment is not a power of two.
    ProbeAlignmentNotPowerOfTwo {
        /// The configured alignment.
        value: usize,
    },
    /// A copy literal is empty or contains an interior NUL byte.
    InvalidLiteral {
        /// Which literal was rejected.
        name: &'static str,
    },
    /// `array_elem_size` or `plain_stride` is zero.
    ZeroSizingFactor {
        /// Which factor was zero.
        name: &'static str,
    },
    /// `final_audits` is zero.
    NoFinalAudits,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotCountOutOfRange { configured } => write!(
                f,
                "slot_count {configured} outside [{}, {}]",
                ProtocolConfig::MIN_SLOT_COUNT,
                ProtocolConfig::MAX_SLOT_COUNT
            ),
            Self::ProbeAlignmentNotPowerOfTwo { value } => {
                write!(f, "aligned probe alignment {value} is not a power of two")
            }
            Self::InvalidLiteral { name } => {
                write!(f, "{name} must be non-empty and contain no NUL bytes")
            }
            Self::ZeroSizingFactor { name } => write!(f, "{name} must be at least 1"),
            Self::NoFinalAudits => write!(f, "final_audits must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

// ── ProtocolConfig ─────────────────────────────────────────────────

/// Shape of one harness run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Number of slots in the handle table. Default: 100.
    pub slot_count: usize,
    /// Size of the aligned probe request in bytes. Default: 70.
    pub probe_size: usize,
    /// Alignment of the aligned probe request. Default: 16.
    pub probe_align: usize,
    /// Literal duplicated into slot 0 by `populate`. Default: `"abc"`.
    pub special_literal: String,
    /// Literal copied with a bound by `repopulate`. Default: `"abcd"`.
    pub bounded_literal: String,
    /// Element size for odd-slot array reallocations. Default: 43.
    pub array_elem_size: usize,
    /// Byte stride for even-slot reallocations (`slot * stride + 1`). Default: 16.
    pub plain_stride: usize,
    /// Consecutive audits required after repopulation. Default: 3.
    pub final_audits: u32,
}

impl ProtocolConfig {
    /// Default table size.
    pub const DEFAULT_SLOT_COUNT: usize = 100;

    /// Smallest table that still gives every batch at least one slot.
    pub const MIN_SLOT_COUNT: usize = 8;

    /// Largest table accepted; keeps every derived size far from overflow.
    pub const MAX_SLOT_COUNT: usize = 1 << 20;

    /// Slot that receives the duplicated literal in `populate`.
    pub const SPECIAL_SLOT: usize = 0;

    /// First slot touched by the reallocation batch.
    pub const REALLOC_START: usize = 3;

    /// First slot released by the release batch.
    pub const RELEASE_START: usize = 2;

    /// Create a config for a table of `slot_count` slots, defaults elsewhere.
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_count,
            probe_size: 70,
            probe_align: 16,
            special_literal: "abc".to_string(),
            bounded_literal: "abcd".to_string(),
            array_elem_size: 43,
            plain_stride: 16,
            final_audits: 3,
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(Self::MIN_SLOT_COUNT..=Self::MAX_SLOT_COUNT).contains(&self.slot_count) {
            return Err(ConfigError::SlotCountOutOfRange {
                configured: self.slot_count,
            });
        }
        if !self.probe_align.is_power_of_two() {
            return Err(ConfigError::ProbeAlignmentNotPowerOfTwo {
                value: self.probe_align,
            });
        }
        for (name, literal) in [
            ("special_literal", &self.special_literal),
            ("bounded_literal", &self.bounded_literal),
        ] {
            if literal.is_empty() || literal.as_bytes().contains(&0) {
                return Err(ConfigError::InvalidLiteral { name });
            }
        }
        if self.array_elem_size == 0 {
            return Err(ConfigError::ZeroSizingFactor {
                name: "array_elem_size",
            });
        }
        if self.plain_stride == 0 {
            return Err(ConfigError::ZeroSizingFactor {
                name: "plain_stride",
            });
        }
        if self.final_audits == 0 {
            return Err(ConfigError::NoFinalAudits);
        }
        Ok(())
    }

    /// Slots filled by the first allocation batch: all of them.
    pub fn populate_range(&self) -> Range<usize> {
        0..self.slot_count
    }

    /// Slots resized by the reallocation batch: `3..N/2`.
    pub fn realloc_range(&self) -> Range<usize> {
        Self::REALLOC_START..self.slot_count / 2
    }

    /// Slots released by the release batch: `2..N`.
    pub fn release_range(&self) -> Range<usize> {
        Self::RELEASE_START..self.slot_count
    }

    /// Slots refilled by the second allocation batch: `0..N/8`.
    pub fn repopulate_range(&self) -> Range<usize> {
        0..self.slot_count / 8
    }

    /// Slots inside the repopulate batch that receive a bounded copy.
    pub fn bounded_copy_slots(&self) -> RangeInclusive<usize> {
        3..=6
    }

    /// Plain allocation size for `slot`: `size_of::<i32>() + slot`.
    pub fn plain_size(&self, slot: usize) -> usize {
        std::mem::size_of::<i32>() + slot
    }

    /// Target size of an even-slot reallocation: `slot * stride + 1`.
    ///
    /// Saturates, so an oversized stride surfaces as an allocation
    /// failure rather than an arithmetic panic.
    pub fn stride_size(&self, slot: usize) -> usize {
        slot.saturating_mul(self.plain_stride).saturating_add(1)
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLOT_COUNT)
    }
}
