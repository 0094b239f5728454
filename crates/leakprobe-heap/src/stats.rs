//! Cumulative counters for the tracking heap.

/// Counters collected over the lifetime of a [`TrackingHeap`](crate::TrackingHeap).
///
/// Counters only ever grow, except the `live_*` gauges which track the
/// current state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Successful allocations of any kind (plain, aligned, copies).
    pub allocations: u64,
    /// Reallocations satisfied without moving the region.
    pub reallocations_in_place: u64,
    /// Reallocations that moved the region and freed its predecessor.
    pub reallocations_moved: u64,
    /// Regions released through `deallocate` or `deallocate_aligned`.
    pub deallocations: u64,
    /// Requests that returned null.
    pub failed_requests: u64,
    /// Releases or queries naming a region this heap does not own.
    pub foreign_handles: u64,
    /// Audits performed.
    pub audits: u64,
    /// Regions reported as leaked, summed over all audits.
    pub leaks_reported: u64,
    /// Regions currently live.
    pub live_regions: usize,
    /// Usable bytes currently held by live regions.
    pub live_bytes: usize,
    /// Highest value `live_bytes` has reached.
    pub peak_bytes: usize,
}

impl HeapStats {
    /// Total reallocations, in place or moved.
    pub fn reallocations(&self) -> u64 {
        self.reallocations_in_place + self.reallocations_moved
    }
}
