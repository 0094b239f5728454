//! Benchmark profiles for the leakprobe harness.
//!
//! - [`reference_profile`]: the default 100-slot protocol
//! - [`stress_profile`]: 2048 slots, same shape
//! - [`leak_finding_heap`]: a fresh tracking heap with leak finding on

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use leakprobe_core::RuntimeProvider;
use leakprobe_harness::ProtocolConfig;
use leakprobe_heap::{HeapProvider, TrackingHeap};

/// Slot count of [`stress_profile`].
pub const STRESS_SLOTS: usize = 2048;

/// The default protocol: 100 slots.
pub fn reference_profile() -> ProtocolConfig {
    ProtocolConfig::default()
}

/// The same protocol over [`STRESS_SLOTS`] slots.
///
/// Peak live bytes stay well under the default heap capacity.
pub fn stress_profile() -> ProtocolConfig {
    ProtocolConfig::new(STRESS_SLOTS)
}

/// A default-capacity heap with leak finding enabled.
pub fn leak_finding_heap() -> TrackingHeap {
    let mut provider = HeapProvider::default();
    provider.enable_leak_finding(true);
    provider.init()
}
