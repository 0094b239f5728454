//! Per-region bookkeeping.

use leakprobe_core::{AllocKind, Reachability};

/// One live region of the tracking heap.
#[derive(Debug)]
pub(crate) struct Region {
    /// Start address in the synthetic address space.
    pub(crate) addr: usize,
    /// Usable size in bytes (requested size rounded up to the granule).
    pub(crate) usable: usize,
    /// How the region was allocated.
    pub(crate) kind: AllocKind,
    /// Contents; `data.len()` is the size the caller requested.
    pub(crate) data: Vec<u8>,
    /// Weak link to the handle that roots this region.
    pub(crate) reach: Reachability,
}

impl Region {
    /// Size the caller asked for.
    pub(crate) fn size(&self) -> usize {
        self.data.len()
    }
}
