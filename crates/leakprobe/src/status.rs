//! Process exit statuses.
//!
//! [`RunStatus`] is a `repr(i32)` enum whose values are the exit codes of
//! the `leakprobe` binary. Conversions from the harness and heap error
//! types are provided.

use std::fmt;

use leakprobe_harness::{ConfigError, HarnessError};
use leakprobe_heap::HeapConfigError;

/// Exit status of a protocol run.
///
/// Values follow `sysexits.h` where one fits. They are stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Every checkpoint passed.
    Succeeded = 0,
    /// The aligned probe returned null or a misaligned address.
    AlignedAllocationFailed = 1,
    /// An audit reported a leak.
    LeakDetected = 3,
    /// An allocation or reallocation returned null (`EX_UNAVAILABLE`).
    OutOfMemory = 69,
    /// The collaborator or the driver broke the protocol (`EX_SOFTWARE`).
    ProtocolViolation = 70,
    /// Invalid configuration, or a runtime without leak finding (`EX_CONFIG`).
    ConfigError = 78,
}

impl RunStatus {
    /// The process exit code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether this is [`RunStatus::Succeeded`].
    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Succeeded => "succeeded",
            Self::AlignedAllocationFailed => "aligned allocation failed",
            Self::LeakDetected => "leak detected",
            Self::OutOfMemory => "out of memory",
            Self::ProtocolViolation => "protocol violation",
            Self::ConfigError => "configuration error",
        };
        write!(f, "{name} ({})", self.code())
    }
}

impl From<&HarnessError> for RunStatus {
    fn from(e: &HarnessError) -> Self {
        match e {
            HarnessError::Config(_) | HarnessError::LeakFindingDisabled => RunStatus::ConfigError,
            HarnessError::AlignedAllocationFailed { .. } => RunStatus::AlignedAllocationFailed,
            HarnessError::AllocationExhausted { .. } => RunStatus::OutOfMemory,
            HarnessError::LeakDetected { .. } => RunStatus::LeakDetected,
            HarnessError::UsableSizeShort { .. }
            | HarnessError::SlotVacant { .. }
            | HarnessError::SlotOutOfRange { .. }
            | HarnessError::OutOfSequence { .. } => RunStatus::ProtocolViolation,
        }
    }
}

impl From<&ConfigError> for RunStatus {
    fn from(_e: &ConfigError) -> Self {
        RunStatus::ConfigError
    }
}

impl From<&HeapConfigError> for RunStatus {
    fn from(_e: &HeapConfigError) -> Self {
        RunStatus::ConfigError
    }
}
