//! Call recording.

use std::cell::Cell;

use leakprobe_core::{
    AlignedHandle, AllocRequest, LeakReport, LeakRuntime, RegionHandle, RegionId, RuntimeProvider,
};

/// One call that reached a [`RecordingRuntime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    /// An allocation, copy, or reallocation request.
    Request(AllocRequest),
    /// `deallocate_aligned`.
    DeallocateAligned,
    /// `deallocate` of the given region.
    Deallocate(RegionId),
    /// `audit_for_leaks`.
    Audit,
}

impl Call {
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    pub fn is_reallocation(&self) -> bool {
        matches!(self, Self::Request(r) if r.is_reallocation())
    }
}

/// A [`LeakRuntime`] that forwards everything to `R` and logs each call.
#[derive(Debug)]
pub struct RecordingRuntime<R> {
    inner: R,
    calls: Vec<Call>,
    usable_size_queries: Cell<u64>,
}

impl<R: LeakRuntime> RecordingRuntime<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: Vec::new(),
            usable_size_queries: Cell::new(0),
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Usable-size queries, which are counted rather than logged in order.
    pub fn usable_size_queries(&self) -> u64 {
        self.usable_size_queries.get()
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: LeakRuntime> LeakRuntime for RecordingRuntime<R> {
    fn leak_finding_enabled(&self) -> bool {
        self.inner.leak_finding_enabled()
    }

    fn allocate(&mut self, size: usize) -> Option<RegionHandle> {
        self.calls.push(Call::Request(AllocRequest::Allocate { size }));
        self.inner.allocate(size)
    }

    fn allocate_aligned(&mut self, size: usize, align: usize) -> Option<AlignedHandle> {
        self.calls
            .push(Call::Request(AllocRequest::Aligned { size, align }));
        self.inner.allocate_aligned(size, align)
    }

    fn deallocate_aligned(&mut self, handle: AlignedHandle) {
        self.calls.push(Call::DeallocateAligned);
        self.inner.deallocate_aligned(handle);
    }

    fn allocate_copy_of(&mut self, s: &str) -> Option<RegionHandle> {
        self.calls
            .push(Call::Request(AllocRequest::CopyOf { len: s.len() }));
        self.inner.allocate_copy_of(s)
    }

    fn allocate_bounded_copy_of(&mut self, s: &str, max_len: usize) -> Option<RegionHandle> {
        self.calls.push(Call::Request(AllocRequest::BoundedCopyOf {
            len: s.len(),
            max_len,
        }));
        self.inner.allocate_bounded_copy_of(s, max_len)
    }

    fn reallocate(
        &mut self,
        handle: RegionHandle,
        new_size: usize,
    ) -> Result<RegionHandle, RegionHandle> {
        self.calls
            .push(Call::Request(AllocRequest::Reallocate { new_size }));
        self.inner.reallocate(handle, new_size)
    }

    fn reallocate_array(
        &mut self,
        handle: RegionHandle,
        count: usize,
        elem_size: usize,
    ) -> Result<RegionHandle, RegionHandle> {
        self.calls
            .push(Call::Request(AllocRequest::ReallocateArray { count, elem_size }));
        self.inner.reallocate_array(handle, count, elem_size)
    }

    fn deallocate(&mut self, handle: RegionHandle) {
        self.calls.push(Call::Deallocate(handle.id()));
        self.inner.deallocate(handle);
    }

    fn usable_size(&self, handle: &RegionHandle) -> usize {
        self.usable_size_queries
            .set(self.usable_size_queries.get() + 1);
        self.inner.usable_size(handle)
    }

    fn audit_for_leaks(&mut self) -> LeakReport {
        self.calls.push(Call::Audit);
        self.inner.audit_for_leaks()
    }
}

/// Wraps a provider so its runtime comes up inside a [`RecordingRuntime`].
#[derive(Clone, Debug)]
pub struct RecordingProvider<P> {
    inner: P,
}

impl<P: RuntimeProvider> RecordingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: RuntimeProvider> RuntimeProvider for RecordingProvider<P> {
    type Runtime = RecordingRuntime<P::Runtime>;

    fn enable_leak_finding(&mut self, enabled: bool) {
        self.inner.enable_leak_finding(enabled);
    }

    fn init(self) -> Self::Runtime {
        RecordingRuntime::new(self.inner.init())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leakprobe_heap::HeapProvider;

    #[test]
    fn records_in_order() {
        let mut provider = RecordingProvider::new(HeapProvider::default());
        provider.enable_leak_finding(true);
        let mut rt = provider.init();

        let h = rt.allocate(4).unwrap();
        let id = h.id();
        let h = rt.reallocate_array(h, 3, 43).unwrap();
        let moved = h.id();
        assert!(rt.usable_size(&h) >= 129);
        rt.deallocate(h);
        rt.audit_for_leaks();

        assert_eq!(
            rt.calls(),
            &[
                Call::Request(AllocRequest::Allocate { size: 4 }),
                Call::Request(AllocRequest::ReallocateArray {
                    count: 3,
                    elem_size: 43
                }),
                Call::Deallocate(moved),
                Call::Audit,
            ]
        );
        assert_ne!(id, moved);
        assert_eq!(rt.count(Call::is_reallocation), 1);
        assert_eq!(rt.usable_size_queries(), 1);
    }
}
