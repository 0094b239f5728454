//! Precise tracking heap for the leakprobe harness.
//!
//! [`TrackingHeap`] is the reference collaborator behind the
//! [`LeakRuntime`](leakprobe_core::LeakRuntime) interface. It models a
//! synthetic address space, alignment, usable sizes and region contents
//! in safe Rust, and treats live handles as the only roots: an audit
//! reports every region whose handle has been dropped without being
//! released.
//!
//! # Architecture
//!
//! ```text
//! HeapProvider (config + leak-finding toggle)
//! └── init() → TrackingHeap
//!     ├── IndexMap<RegionId, Region> (allocation order, drives audit order)
//!     ├── bump cursor over a synthetic address space (never reused)
//!     └── HeapStats (cumulative counters)
//! ```
//!
//! Nothing here is a production allocator: region bytes live in ordinary
//! `Vec<u8>` buffers and addresses are bookkeeping only.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod heap;
pub mod provider;
mod region;
pub mod stats;

pub use config::HeapConfig;
pub use error::HeapConfigError;
pub use heap::TrackingHeap;
pub use provider::HeapProvider;
pub use stats::HeapStats;
