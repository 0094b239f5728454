//! Core types and traits for the leakprobe harness.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the capability interface a leak detector and its allocator expose to
//! the harness, the move-only handles those collaborators hand out, and
//! the leak reports an audit returns.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod handle;
pub mod id;
pub mod leak;
pub mod request;
pub mod traits;

pub use handle::{AlignedHandle, Reachability, RegionHandle};
pub use id::RegionId;
pub use leak::{AllocKind, LeakReport, LeakedRegion};
pub use request::AllocRequest;
pub use traits::{LeakRuntime, RuntimeProvider};
