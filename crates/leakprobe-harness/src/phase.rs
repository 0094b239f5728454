//! Run phases and the order operations may be applied in.
//!
//! ```text
//! Initialized ─probe_aligned_allocation─▶ Probed ─populate─▶ Populated
//!   ─audit─▶ (Populated, 1 audit)
//!   ─grow_or_shrink─▶ Reallocated ─audit─▶ (Reallocated, 1 audit)
//!   ─release─▶ Released ─repopulate─▶ Repopulated ─audit×3─▶ finish ─▶ Succeeded
//! ```
//!
//! Audits do not change the phase; they bump a counter that resets on
//! every mutating operation. Any error moves the run to `Failed`, which
//! accepts nothing.

use std::fmt;

/// Where a run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runtime initialized with leak finding on; table empty.
    Initialized,
    /// The aligned probe was allocated and released.
    Probed,
    /// Every slot holds a fresh region.
    Populated,
    /// The reallocation batch has replaced its slots' regions.
    Reallocated,
    /// The release batch has vacated its slots.
    Released,
    /// The low slots hold second-generation regions.
    Repopulated,
    /// All checkpoints passed.
    Succeeded,
    /// A fatal error occurred; the run cannot continue.
    Failed,
}

impl Phase {
    /// Whether the run has ended, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Phase after applying `op`, or `None` if `op` is not allowed now.
    ///
    /// `audits` is the number of clean audits since the last mutating
    /// operation; `final_audits` is how many the last checkpoint needs.
    pub fn next(self, op: Operation, audits: u32, final_audits: u32) -> Option<Phase> {
        use Operation as Op;
        use Phase as P;
        match (self, op) {
            (P::Initialized, Op::ProbeAligned) => Some(P::Probed),
            (P::Probed, Op::Populate) => Some(P::Populated),
            (P::Populated, Op::GrowOrShrink) if audits >= 1 => Some(P::Reallocated),
            (P::Reallocated, Op::Release) if audits >= 1 => Some(P::Released),
            (P::Released, Op::Repopulate) => Some(P::Repopulated),
            (P::Repopulated, Op::Finish) if audits >= final_audits => Some(P::Succeeded),
            (phase, Op::Audit) if !phase.is_terminal() => Some(phase),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Probed => "probed",
            Self::Populated => "populated",
            Self::Reallocated => "reallocated",
            Self::Released => "released",
            Self::Repopulated => "repopulated",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A driver operation, as checked against the current [`Phase`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Aligned allocate-and-release smoke test.
    ProbeAligned,
    /// First allocation batch.
    Populate,
    /// Reallocation batch.
    GrowOrShrink,
    /// Deallocation batch.
    Release,
    /// Second allocation batch.
    Repopulate,
    /// Leak audit checkpoint.
    Audit,
    /// Final transition to `Succeeded`.
    Finish,
}

impl Operation {
    /// Whether the operation changes which regions exist.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Populate | Self::GrowOrShrink | Self::Release | Self::Repopulate
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProbeAligned => "probe_aligned_allocation",
            Self::Populate => "populate",
            Self::GrowOrShrink => "grow_or_shrink",
            Self::Release => "release",
            Self::Repopulate => "repopulate",
            Self::Audit => "audit",
            Self::Finish => "finish",
        };
        f.write_str(name)
    }
}
