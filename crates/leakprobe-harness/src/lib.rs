//! Allocation lifecycle driver for the leakprobe harness.
//!
//! [`LifecycleDriver`] owns a fixed-size table of region handles and runs
//! a deterministic protocol against any [`LeakRuntime`]:
//!
//! ```text
//! initialize ─▶ probe aligned ─▶ populate ─▶ audit ─▶ grow/shrink ─▶ audit
//!           ─▶ release ─▶ repopulate ─▶ audit ×3 ─▶ succeeded
//! ```
//!
//! Every audit must come back clean. The first allocation failure, leak
//! report or contract violation moves the driver to [`Phase::Failed`] and
//! is returned as a [`HarnessError`]; nothing is retried.
//!
//! [`LeakRuntime`]: leakprobe_core::LeakRuntime

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod phase;
pub mod table;

pub use config::{ConfigError, ProtocolConfig};
pub use driver::LifecycleDriver;
pub use error::{AlignedFailure, Checkpoint, HarnessError};
pub use metrics::{RunMetrics, RunReport};
pub use phase::{Operation, Phase};
pub use table::SlotTable;
