//! Leakprobe: a validation harness for leak detectors.
//!
//! This is the top-level facade crate. It re-exports the public API of the
//! sub-crates and adds the thin runner that turns a harness outcome into a
//! process status.
//!
//! # Quick start
//!
//! ```rust
//! use leakprobe::prelude::*;
//!
//! let outcome = run_protocol(HeapProvider::default(), ProtocolConfig::default());
//! assert_eq!(outcome.status, RunStatus::Succeeded);
//! assert_eq!(outcome.status.code(), 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `leakprobe-core` | Handles, requests, leak reports, capability traits |
//! | [`heap`] | `leakprobe-heap` | Reference tracking heap |
//! | [`harness`] | `leakprobe-harness` | Lifecycle driver, slot table, phases |
//! | [`status`] | this crate | Exit status mapping |
//! | [`runner`] | this crate | One-call protocol runner |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Handles, requests, leak reports and the capability traits (`leakprobe-core`).
pub use leakprobe_core as types;

/// Reference tracking heap (`leakprobe-heap`).
///
/// [`heap::HeapProvider`] is the collaborator the binary runs against.
pub use leakprobe_heap as heap;

/// Lifecycle driver and protocol configuration (`leakprobe-harness`).
pub use leakprobe_harness as harness;

pub mod runner;
pub mod status;

pub use runner::{run_protocol, Outcome};
pub use status::RunStatus;

/// Common imports for running the protocol.
pub mod prelude {
    pub use leakprobe_core::{LeakReport, LeakRuntime, RegionHandle, RuntimeProvider};
    pub use leakprobe_harness::{HarnessError, LifecycleDriver, Phase, ProtocolConfig, RunReport};
    pub use leakprobe_heap::{HeapConfig, HeapProvider, TrackingHeap};

    pub use crate::runner::{run_protocol, Outcome};
    pub use crate::status::RunStatus;
}
