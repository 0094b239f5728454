//! Harness error types.
//!
//! Every variant is fatal to the run. [`AllocationExhausted`] and
//! [`LeakDetected`] are the two outcomes the protocol exists to tell
//! apart; the rest report contract violations by the collaborator or
//! misuse of the driver.
//!
//! [`AllocationExhausted`]: HarnessError::AllocationExhausted
//! [`LeakDetected`]: HarnessError::LeakDetected

use std::error::Error;
use std::fmt;

use leakprobe_core::{AllocRequest, LeakReport};

use crate::config::ConfigError;
use crate::phase::{Operation, Phase};

/// Why the aligned probe failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignedFailure {
    /// The runtime returned null.
    Null,
    /// The returned address does not honour the alignment.
    Misaligned {
        /// Address the runtime returned.
        addr: usize,
    },
}

/// The audit that found a leak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// Phase the run was in when the audit ran.
    pub phase: Phase,
    /// 1-based count of consecutive audits in that phase.
    pub pass: u32,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} checkpoint, pass {}", self.phase, self.pass)
    }
}

/// Errors that end a harness run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessError {
    /// The protocol configuration is invalid.
    Config(ConfigError),
    /// The runtime came up without leak finding, so audits would be vacuous.
    LeakFindingDisabled,
    /// The aligned probe allocation failed.
    AlignedAllocationFailed {
        /// Requested size.
        size: usize,
        /// Requested alignment.
        align: usize,
        /// What went wrong.
        reason: AlignedFailure,
    },
    /// An allocation, duplication or reallocation returned null.
    AllocationExhausted {
        /// Slot the request was made for.
        slot: usize,
        /// The request that failed.
        request: AllocRequest,
    },
    /// The runtime reported a usable size below the requested size.
    UsableSizeShort {
        /// Slot whose region was queried.
        slot: usize,
        /// Bytes requested.
        requested: usize,
        /// Usable size reported.
        usable: usize,
    },
    /// An audit found unreachable, unreleased regions.
    LeakDetected {
        /// The audit that failed.
        checkpoint: Checkpoint,
        /// What it found.
        report: LeakReport,
    },
    /// A slot was read or released while it held no handle.
    SlotVacant {
        /// The vacant slot.
        slot: usize,
    },
    /// A slot index past the end of the table.
    SlotOutOfRange {
        /// The requested slot.
        slot: usize,
        /// Table length.
        len: usize,
    },
    /// An operation was applied out of protocol order.
    OutOfSequence {
        /// The rejected operation.
        operation: Operation,
        /// Phase the run was in.
        phase: Phase,
    },
}

impl HarnessError {
    /// Whether this is the out-of-memory outcome.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::AllocationExhausted { .. })
    }

    /// Whether this is the leak outcome.
    pub fn is_leak(&self) -> bool {
        matches!(self, Self::LeakDetected { .. })
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid protocol config: {e}"),
            Self::LeakFindingDisabled => {
                write!(f, "runtime initialized without leak finding")
            }
            Self::AlignedAllocationFailed {
                size,
                align,
                reason,
            } => match reason {
                AlignedFailure::Null => {
                    write!(f, "Aligned allocation failed: allocate_aligned({size}, {align}) returned null")
                }
                AlignedFailure::Misaligned { addr } => write!(
                    f,
                    "Aligned allocation failed: allocate_aligned({size}, {align}) returned {addr:#x}"
                ),
            },
            Self::AllocationExhausted { slot, request } => {
                write!(f, "Out of memory: {request} for slot {slot} returned null")
            }
            Self::UsableSizeShort {
                slot,
                requested,
                usable,
            } => write!(
                f,
                "usable size {usable} below requested {requested} bytes for slot {slot}"
            ),
            Self::LeakDetected { checkpoint, report } => {
                write!(f, "Leak detected at {checkpoint}: {report}")
            }
            Self::SlotVacant { slot } => write!(f, "slot {slot} holds no handle"),
            Self::SlotOutOfRange { slot, len } => {
                write!(f, "slot {slot} out of range for table of {len}")
            }
            Self::OutOfSequence { operation, phase } => {
                write!(f, "{operation} not allowed in phase {phase}")
            }
        }
    }
}

impl Error for HarnessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for HarnessError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_are_distinct() {
        let oom = HarnessError::AllocationExhausted {
            slot: 7,
            request: AllocRequest::Allocate { size: 11 },
        };
        let leak = HarnessError::LeakDetected {
            checkpoint: Checkpoint {
                phase: Phase::Repopulated,
                pass: 2,
            },
            report: LeakReport::new(12, 192),
        };
        let aligned = HarnessError::AlignedAllocationFailed {
            size: 70,
            align: 16,
            reason: AlignedFailure::Null,
        };
        assert!(oom.to_string().starts_with("Out of memory"));
        assert!(leak.to_string().starts_with("Leak detected"));
        assert!(aligned.to_string().starts_with("Aligned allocation failed"));
        assert!(oom.is_exhaustion() && !oom.is_leak());
        assert!(leak.is_leak() && !leak.is_exhaustion());
    }

    #[test]
    fn oom_names_the_request() {
        let e = HarnessError::AllocationExhausted {
            slot: 9,
            request: AllocRequest::ReallocateArray {
                count: 9,
                elem_size: 43,
            },
        };
        assert_eq!(
            e.to_string(),
            "Out of memory: reallocate_array(9, 43) for slot 9 returned null"
        );
    }

    #[test]
    fn checkpoint_display() {
        let c = Checkpoint {
            phase: Phase::Reallocated,
            pass: 1,
        };
        assert_eq!(c.to_string(), "reallocated checkpoint, pass 1");
    }

    #[test]
    fn config_error_is_source() {
        let e = HarnessError::from(ConfigError::NoFinalAudits);
        assert!(e.source().is_some());
        assert!(HarnessError::LeakFindingDisabled.source().is_none());
    }
}
