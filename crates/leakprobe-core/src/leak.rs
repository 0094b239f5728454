//! Leak audit results.

use std::fmt;

use smallvec::SmallVec;

use crate::id::RegionId;

/// How a region came to exist, as recorded by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocKind {
    /// Plain `allocate(size)`.
    Plain,
    /// `allocate_aligned(size, align)`.
    Aligned {
        /// Requested alignment in bytes.
        align: usize,
    },
    /// `allocate_copy_of(s)`.
    Copy,
    /// `allocate_bounded_copy_of(s, max_len)`.
    BoundedCopy,
    /// Produced by a reallocation that moved the region.
    Reallocated,
}

impl fmt::Display for AllocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Aligned { align } => write!(f, "aligned({align})"),
            Self::Copy => write!(f, "copy"),
            Self::BoundedCopy => write!(f, "bounded copy"),
            Self::Reallocated => write!(f, "reallocated"),
        }
    }
}

/// One region an audit found unreachable but not freed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeakedRegion {
    /// Region id.
    pub id: RegionId,
    /// Start address.
    pub addr: usize,
    /// Size in bytes requested by the caller.
    pub size: usize,
    /// How the region was allocated.
    pub kind: AllocKind,
}

impl fmt::Display for LeakedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region {} @ {:#x} ({} bytes, {})",
            self.id, self.addr, self.size, self.kind
        )
    }
}

/// Outcome of a single leak audit.
///
/// A clean report has no leaks. Regions are listed in allocation order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeakReport {
    leaks: SmallVec<[LeakedRegion; 4]>,
    regions_scanned: usize,
    live_bytes: usize,
}

impl LeakReport {
    /// An empty report for a scan over `regions_scanned` regions.
    pub fn new(regions_scanned: usize, live_bytes: usize) -> Self {
        Self {
            leaks: SmallVec::new(),
            regions_scanned,
            live_bytes,
        }
    }

    /// Record a leaked region.
    pub fn push(&mut self, leak: LeakedRegion) {
        self.leaks.push(leak);
    }

    /// Whether the audit found no leaks.
    pub fn is_clean(&self) -> bool {
        self.leaks.is_empty()
    }

    /// Number of leaked regions.
    pub fn leak_count(&self) -> usize {
        self.leaks.len()
    }

    /// Sum of the requested sizes of all leaked regions.
    pub fn leaked_bytes(&self) -> usize {
        self.leaks.iter().map(|l| l.size).sum()
    }

    /// The leaked regions.
    pub fn leaks(&self) -> &[LeakedRegion] {
        &self.leaks
    }

    /// Number of live regions the audit examined.
    pub fn regions_scanned(&self) -> usize {
        self.regions_scanned
    }

    /// Usable bytes held by reachable regions after the audit.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "no leaks in {} regions", self.regions_scanned);
        }
        write!(
            f,
            "{} leaked region(s), {} bytes:",
            self.leak_count(),
            self.leaked_bytes()
        )?;
        for leak in &self.leaks {
            write!(f, " [{leak}]")?;
        }
        Ok(())
    }
}
