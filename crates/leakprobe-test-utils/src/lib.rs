//! Test collaborators for leakprobe development.
//!
//! Wrappers that sit between the harness and a real runtime:
//!
//! - [`FaultInjector`]: makes chosen requests fail, leak, or report
//!   phantom leaks, following a [`FaultPlan`].
//! - [`RecordingRuntime`]: logs every call as a [`Call`] for sequence
//!   assertions.
//!
//! Both have a matching provider so they can be installed before `init`,
//! and both compose: a fault injector can wrap a recorder and vice versa.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fault;
pub mod recording;

pub use fault::{FaultInjector, FaultPlan, FaultyProvider};
pub use recording::{Call, RecordingProvider, RecordingRuntime};

use leakprobe_heap::HeapProvider;

/// A heap provider recorded call by call.
pub fn recording_heap() -> RecordingProvider<HeapProvider> {
    RecordingProvider::new(HeapProvider::default())
}

/// A heap provider with `plan` applied.
pub fn faulty_heap(plan: FaultPlan) -> FaultyProvider<HeapProvider> {
    FaultyProvider::new(HeapProvider::default(), plan)
}
