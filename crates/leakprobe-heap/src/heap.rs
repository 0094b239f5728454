//! The tracking heap.
//!
//! Regions are kept in an [`IndexMap`] keyed by [`RegionId`], in allocation
//! order, so audits report leaks deterministically. Addresses come from a
//! bump cursor that never moves backwards: a freed address is never handed
//! out again, so a stale address can never alias a newer region.

use indexmap::IndexMap;
use leakprobe_core::{
    AlignedHandle, AllocKind, LeakReport, LeakRuntime, LeakedRegion, Reachability, RegionHandle,
    RegionId,
};
use tracing::{debug, trace, warn};

use crate::config::{round_up, HeapConfig};
use crate::region::Region;
use crate::stats::HeapStats;

/// Precise leak-detecting heap.
///
/// Obtained from [`HeapProvider::init`](crate::HeapProvider). Every live
/// [`RegionHandle`] is a root; a region whose handle no longer exists is
/// reported by the next audit and then reclaimed, so no leak is reported
/// twice.
#[derive(Debug)]
pub struct TrackingHeap {
    config: HeapConfig,
    find_leaks: bool,
    /// Live regions in allocation order.
    regions: IndexMap<RegionId, Region>,
    next_id: u64,
    /// Next free address in the synthetic address space.
    cursor: usize,
    stats: HeapStats,
}

impl TrackingHeap {
    /// Create a heap from a config that has already been validated.
    pub(crate) fn new(config: HeapConfig, find_leaks: bool) -> Self {
        let cursor = config.base_address;
        debug!(
            capacity_bytes = config.capacity_bytes,
            min_alignment = config.min_alignment,
            find_leaks,
            "tracking heap initialized"
        );
        Self {
            config,
            find_leaks,
            regions: IndexMap::new(),
            next_id: 1,
            cursor,
            stats: HeapStats::default(),
        }
    }

    /// The configuration this heap was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Cumulative counters.
    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    /// Number of live regions, reachable or not.
    pub fn live_regions(&self) -> usize {
        self.regions.len()
    }

    /// Usable bytes held by live regions.
    pub fn live_bytes(&self) -> usize {
        self.stats.live_bytes
    }

    /// Whether a region with this id is live.
    pub fn is_live(&self, id: RegionId) -> bool {
        self.regions.contains_key(&id)
    }

    /// Number of live regions that no handle reaches.
    ///
    /// Unlike an audit this does not report or reclaim anything.
    pub fn unreachable_regions(&self) -> usize {
        self.regions
            .values()
            .filter(|r| !r.reach.is_reachable())
            .count()
    }

    /// Contents of a live region, `size` bytes long.
    ///
    /// Returns `None` for a handle this heap does not own.
    pub fn contents(&self, handle: &RegionHandle) -> Option<&[u8]> {
        self.owned(handle).map(|r| r.data.as_slice())
    }

    /// Mutable contents of a live region.
    pub fn contents_mut(&mut self, handle: &RegionHandle) -> Option<&mut [u8]> {
        let region = self.regions.get_mut(&handle.id())?;
        if !handle.is_tracked_by(&region.reach) {
            return None;
        }
        Some(region.data.as_mut_slice())
    }

    fn owned(&self, handle: &RegionHandle) -> Option<&Region> {
        self.regions
            .get(&handle.id())
            .filter(|r| handle.is_tracked_by(&r.reach))
    }

    fn fresh_id(&mut self) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Reserve address space for `size` bytes at `align`.
    ///
    /// Returns `(addr, usable)` or `None` if the request overflows or
    /// would exceed the capacity limit.
    fn reserve(&mut self, size: usize, align: usize) -> Option<(usize, usize)> {
        let usable = self.config.usable_size_for(size)?;
        let live_after = self.stats.live_bytes.checked_add(usable)?;
        if live_after > self.config.capacity_bytes {
            return None;
        }
        let addr = round_up(self.cursor, align.max(self.config.min_alignment))?;
        self.cursor = addr.checked_add(usable)?;
        self.stats.live_bytes = live_after;
        self.stats.peak_bytes = self.stats.peak_bytes.max(live_after);
        Some((addr, usable))
    }

    /// Place a `size`-byte region and return its handle.
    ///
    /// `fill` builds the contents only once the address space is reserved.
    fn place(
        &mut self,
        size: usize,
        align: usize,
        kind: AllocKind,
        fill: impl FnOnce() -> Vec<u8>,
    ) -> Option<RegionHandle> {
        let Some((addr, usable)) = self.reserve(size, align) else {
            self.stats.failed_requests += 1;
            debug!(size, %kind, "allocation request failed");
            return None;
        };
        let id = self.fresh_id();
        let (handle, reach) = RegionHandle::new(id, addr);
        self.insert(id, addr, usable, kind, fill(), reach);
        Some(handle)
    }

    fn insert(
        &mut self,
        id: RegionId,
        addr: usize,
        usable: usize,
        kind: AllocKind,
        data: Vec<u8>,
        reach: Reachability,
    ) {
        trace!(%id, addr, size = data.len(), %kind, "region allocated");
        self.regions.insert(
            id,
            Region {
                addr,
                usable,
                kind,
                data,
                reach,
            },
        );
        self.stats.allocations += 1;
        self.stats.live_regions = self.regions.len();
    }

    fn remove(&mut self, id: RegionId) -> Option<Region> {
        let region = self.regions.shift_remove(&id)?;
        self.stats.live_bytes -= region.usable;
        self.stats.live_regions = self.regions.len();
        Some(region)
    }

    fn terminated_copy(bytes: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(bytes.len() + 1);
        data.extend_from_slice(bytes);
        data.push(0);
        data
    }
}

impl LeakRuntime for TrackingHeap {
    fn leak_finding_enabled(&self) -> bool {
        self.find_leaks
    }

    fn allocate(&mut self, size: usize) -> Option<RegionHandle> {
        let min_alignment = self.config.min_alignment;
        self.place(size, min_alignment, AllocKind::Plain, || vec![0; size])
    }

    fn allocate_aligned(&mut self, size: usize, align: usize) -> Option<AlignedHandle> {
        if !align.is_power_of_two() {
            self.stats.failed_requests += 1;
            debug!(size, align, "aligned request with non power-of-two alignment");
            return None;
        }
        let Some((addr, usable)) = self.reserve(size, align) else {
            self.stats.failed_requests += 1;
            debug!(size, align, "aligned allocation request failed");
            return None;
        };
        let id = self.fresh_id();
        let (handle, reach) = AlignedHandle::new(id, addr, align);
        self.insert(
            id,
            addr,
            usable,
            AllocKind::Aligned { align },
            vec![0; size],
            reach,
        );
        Some(handle)
    }

    fn deallocate_aligned(&mut self, handle: AlignedHandle) {
        let owned = self
            .regions
            .get(&handle.id())
            .is_some_and(|r| handle.is_tracked_by(&r.reach));
        if !owned {
            self.stats.foreign_handles += 1;
            warn!(id = %handle.id(), "deallocate_aligned of a region this heap does not own");
            return;
        }
        if self.remove(handle.id()).is_some() {
            self.stats.deallocations += 1;
        }
    }

    fn allocate_copy_of(&mut self, s: &str) -> Option<RegionHandle> {
        let min_alignment = self.config.min_alignment;
        let bytes = s.as_bytes();
        self.place(bytes.len() + 1, min_alignment, AllocKind::Copy, || {
            Self::terminated_copy(bytes)
        })
    }

    fn allocate_bounded_copy_of(&mut self, s: &str, max_len: usize) -> Option<RegionHandle> {
        let min_alignment = self.config.min_alignment;
        let bytes = &s.as_bytes()[..s.len().min(max_len)];
        self.place(bytes.len() + 1, min_alignment, AllocKind::BoundedCopy, || {
            Self::terminated_copy(bytes)
        })
    }

    fn reallocate(
        &mut self,
        handle: RegionHandle,
        new_size: usize,
    ) -> Result<RegionHandle, RegionHandle> {
        let id = handle.id();
        let Some(usable) = self.owned(&handle).map(|r| r.usable) else {
            self.stats.foreign_handles += 1;
            warn!(%id, "reallocate of a region this heap does not own");
            return Err(handle);
        };

        if new_size <= usable {
            if let Some(region) = self.regions.get_mut(&id) {
                region.data.resize(new_size, 0);
            }
            self.stats.reallocations_in_place += 1;
            trace!(%id, new_size, "reallocated in place");
            return Ok(handle);
        }

        let min_alignment = self.config.min_alignment;
        let Some((addr, new_usable)) = self.reserve(new_size, min_alignment) else {
            self.stats.failed_requests += 1;
            debug!(%id, new_size, "reallocation request failed");
            return Err(handle);
        };

        let Some(old) = self.remove(id) else {
            // `owned` succeeded above, so the region is still present.
            return Err(handle);
        };
        let mut data = old.data;
        data.resize(new_size, 0);
        drop(handle);

        let new_id = self.fresh_id();
        let (moved, reach) = RegionHandle::new(new_id, addr);
        self.regions.insert(
            new_id,
            Region {
                addr,
                usable: new_usable,
                kind: AllocKind::Reallocated,
                data,
                reach,
            },
        );
        self.stats.live_regions = self.regions.len();
        self.stats.reallocations_moved += 1;
        trace!(from = %id, to = %new_id, new_size, "reallocated by moving");
        Ok(moved)
    }

    fn deallocate(&mut self, handle: RegionHandle) {
        if self.owned(&handle).is_none() {
            self.stats.foreign_handles += 1;
            warn!(id = %handle.id(), "deallocate of a region this heap does not own");
            return;
        }
        if self.remove(handle.id()).is_some() {
            self.stats.deallocations += 1;
            trace!(id = %handle.id(), "region released");
        }
    }

    fn usable_size(&self, handle: &RegionHandle) -> usize {
        self.owned(handle).map_or(0, |r| r.usable)
    }

    fn audit_for_leaks(&mut self) -> LeakReport {
        self.stats.audits += 1;
        let scanned = self.regions.len();
        if !self.find_leaks {
            return LeakReport::new(scanned, self.stats.live_bytes);
        }

        let leaked: Vec<RegionId> = self
            .regions
            .iter()
            .filter(|(_, r)| !r.reach.is_reachable())
            .map(|(&id, _)| id)
            .collect();

        let mut found = Vec::with_capacity(leaked.len());
        for id in leaked {
            if let Some(region) = self.remove(id) {
                warn!(%id, addr = region.addr, size = region.size(), kind = %region.kind, "leaked region");
                found.push(LeakedRegion {
                    id,
                    addr: region.addr,
                    size: region.size(),
                    kind: region.kind,
                });
            }
        }

        self.stats.leaks_reported += found.len() as u64;
        let mut report = LeakReport::new(scanned, self.stats.live_bytes);
        for leak in found {
            report.push(leak);
        }
        debug!(scanned, leaks = report.leak_count(), "audit complete");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeapProvider;
    use leakprobe_core::RuntimeProvider;

    fn heap() -> TrackingHeap {
        let mut provider = HeapProvider::default();
        provider.enable_leak_finding(true);
        provider.init()
    }

    fn small_heap(capacity_bytes: usize) -> TrackingHeap {
        let mut provider = HeapProvider::new(HeapConfig::new(capacity_bytes)).unwrap();
        provider.enable_leak_finding(true);
        provider.init()
    }

    #[test]
    fn allocate_returns_aligned_distinct_addresses() {
        let mut heap = heap();
        let a = heap.allocate(5).unwrap();
        let b = heap.allocate(5).unwrap();
        assert_ne!(a.addr(), b.addr());
        assert_eq!(a.addr() % 16, 0);
        assert_eq!(b.addr() % 16, 0);
        assert_eq!(heap.live_regions(), 2);
        heap.deallocate(a);
        heap.deallocate(b);
        assert_eq!(heap.live_regions(), 0);
        assert_eq!(heap.live_bytes(), 0);
    }

    #[test]
    fn usable_size_covers_request() {
        let mut heap = heap();
        for size in [0usize, 1, 5, 16, 17, 103] {
            let h = heap.allocate(size).unwrap();
            let usable = heap.usable_size(&h);
            assert!(usable >= size, "usable {usable} < requested {size}");
            assert_eq!(usable % 16, 0);
            heap.deallocate(h);
        }
    }

    #[test]
    fn aligned_allocation_honours_large_alignment() {
        let mut heap = heap();
        let pad = heap.allocate(3).unwrap();
        let h = heap.allocate_aligned(70, 256).unwrap();
        assert!(h.is_aligned());
        assert_eq!(h.addr() % 256, 0);
        heap.deallocate_aligned(h);
        heap.deallocate(pad);
        assert!(heap.audit_for_leaks().is_clean());
    }

    #[test]
    fn aligned_allocation_rejects_bad_alignment() {
        let mut heap = heap();
        assert!(heap.allocate_aligned(70, 24).is_none());
        assert!(heap.allocate_aligned(70, 0).is_none());
        assert_eq!(heap.stats().failed_requests, 2);
    }

    #[test]
    fn copy_is_terminated() {
        let mut heap = heap();
        let h = heap.allocate_copy_of("abc").unwrap();
        assert_eq!(heap.contents(&h).unwrap(), b"abc\0");
        heap.deallocate(h);
    }

    #[test]
    fn bounded_copy_truncates_and_terminates() {
        let mut heap = heap();
        let expected: [&[u8]; 4] = [b"abc\0", b"abcd\0", b"abcd\0", b"abcd\0"];
        for (bound, want) in (3..=6).zip(expected) {
            let h = heap.allocate_bounded_copy_of("abcd", bound).unwrap();
            assert_eq!(heap.contents(&h).unwrap(), want, "bound {bound}");
            heap.deallocate(h);
        }
        let empty = heap.allocate_bounded_copy_of("abcd", 0).unwrap();
        assert_eq!(heap.contents(&empty).unwrap(), b"\0");
        heap.deallocate(empty);
    }

    #[test]
    fn shrinking_reallocation_stays_in_place() {
        let mut heap = heap();
        let h = heap.allocate(40).unwrap();
        let addr = h.addr();
        let h = heap.reallocate(h, 33).unwrap();
        assert_eq!(h.addr(), addr);
        assert_eq!(heap.contents(&h).unwrap().len(), 33);
        assert_eq!(heap.stats().reallocations_in_place, 1);
        heap.deallocate(h);
    }

    #[test]
    fn growing_reallocation_moves_and_preserves_contents() {
        let mut heap = heap();
        let h = heap.allocate_copy_of("abc").unwrap();
        let old_id = h.id();
        let h = heap.reallocate(h, 200).unwrap();
        assert_ne!(h.id(), old_id);
        assert!(!heap.is_live(old_id));
        let data = heap.contents(&h).unwrap();
        assert_eq!(data.len(), 200);
        assert_eq!(&data[..4], b"abc\0");
        assert!(data[4..].iter().all(|&b| b == 0));
        assert_eq!(heap.stats().reallocations_moved, 1);
        heap.deallocate(h);
        assert!(heap.audit_for_leaks().is_clean());
    }

    #[test]
    fn reallocate_array_overflow_returns_original() {
        let mut heap = heap();
        let h = heap.allocate(8).unwrap();
        let id = h.id();
        let h = heap.reallocate_array(h, usize::MAX, 43).unwrap_err();
        assert_eq!(h.id(), id);
        assert!(heap.is_live(id));
        heap.deallocate(h);
    }

    #[test]
    fn failed_reallocation_leaves_region_untouched() {
        let mut heap = small_heap(64);
        let h = heap.allocate_copy_of("abc").unwrap();
        let h = heap.reallocate(h, 1024).unwrap_err();
        assert_eq!(heap.contents(&h).unwrap(), b"abc\0");
        assert_eq!(heap.stats().failed_requests, 1);
        heap.deallocate(h);
        assert!(heap.audit_for_leaks().is_clean());
    }

    #[test]
    fn capacity_limit_returns_null() {
        let mut heap = small_heap(32);
        let a = heap.allocate(16).unwrap();
        let b = heap.allocate(16).unwrap();
        assert!(heap.allocate(1).is_none());
        heap.deallocate(a);
        let c = heap.allocate(1).unwrap();
        heap.deallocate(b);
        heap.deallocate(c);
        assert_eq!(heap.stats().peak_bytes, 32);
    }

    #[test]
    fn oversized_request_returns_null_without_building_contents() {
        let mut heap = heap();
        assert!(heap.allocate(usize::MAX).is_none());
        assert!(heap.allocate(heap.config().capacity_bytes + 1).is_none());
        assert!(heap.allocate_aligned(usize::MAX, 16).is_none());
        assert_eq!(heap.stats().failed_requests, 3);
        assert_eq!(heap.live_regions(), 0);
        assert_eq!(heap.live_bytes(), 0);
    }

    #[test]
    fn dropped_handle_is_reported_once() {
        let mut heap = heap();
        let kept = heap.allocate(8).unwrap();
        let lost = heap.allocate(12).unwrap();
        let lost_id = lost.id();
        drop(lost);
        assert_eq!(heap.unreachable_regions(), 1);

        let report = heap.audit_for_leaks();
        assert_eq!(report.leak_count(), 1);
        assert_eq!(report.leaks()[0].id, lost_id);
        assert_eq!(report.leaks()[0].size, 12);
        assert_eq!(report.regions_scanned(), 2);

        let again = heap.audit_for_leaks();
        assert!(again.is_clean());
        assert_eq!(heap.stats().leaks_reported, 1);
        heap.deallocate(kept);
    }

    #[test]
    fn audits_without_activity_are_stable() {
        let mut heap = heap();
        let handles: Vec<_> = (0..10).map(|i| heap.allocate(4 + i).unwrap()).collect();
        for _ in 0..3 {
            let report = heap.audit_for_leaks();
            assert!(report.is_clean());
            assert_eq!(report.regions_scanned(), 10);
        }
        for h in handles {
            heap.deallocate(h);
        }
    }

    #[test]
    fn audit_without_leak_finding_reports_nothing() {
        let mut heap = HeapProvider::default().init();
        assert!(!heap.leak_finding_enabled());
        let lost = heap.allocate(8).unwrap();
        drop(lost);
        assert!(heap.audit_for_leaks().is_clean());
        assert_eq!(heap.live_regions(), 1);
    }

    #[test]
    fn foreign_handles_are_ignored() {
        let mut a = heap();
        let mut b = heap();
        let h = a.allocate(8).unwrap();
        let stranger = b.allocate(8).unwrap();
        // Same id in both heaps, but the anchor belongs to `b`.
        assert_eq!(h.id(), stranger.id());
        assert_eq!(a.usable_size(&stranger), 0);
        a.deallocate(stranger);
        assert_eq!(a.stats().foreign_handles, 1);
        assert!(a.is_live(h.id()));
        a.deallocate(h);
        assert_eq!(b.audit_for_leaks().leak_count(), 1);
    }
}
