//! Deterministic fault injection.
//!
//! Every counter is 1-based and counts calls as they reach the injector,
//! so `fail_allocation(1)` fails the very first allocation request.

use leakprobe_core::{
    AlignedHandle, AllocKind, LeakReport, LeakRuntime, LeakedRegion, RegionHandle, RegionId,
    RuntimeProvider,
};
use tracing::debug;

/// Which faults to inject, and when.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Return null from the n-th allocation request. Plain allocations,
    /// copies and reallocations all count; the aligned probe does not.
    pub fail_allocation: Option<u64>,
    /// On the n-th reallocation, allocate a fresh region and drop the
    /// predecessor's handle instead of releasing it.
    pub leak_on_reallocation: Option<u64>,
    /// Drop the handle instead of releasing it on the n-th deallocation.
    pub leak_on_deallocation: Option<u64>,
    /// Return null from every aligned allocation.
    pub fail_aligned: bool,
    /// Add a fabricated leak to the n-th audit report.
    pub phantom_leak_on_audit: Option<u64>,
    /// Ignore `enable_leak_finding(true)` at provider level.
    pub disable_leak_finding: bool,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_allocation(mut self, nth: u64) -> Self {
        self.fail_allocation = Some(nth);
        self
    }

    pub fn leak_on_reallocation(mut self, nth: u64) -> Self {
        self.leak_on_reallocation = Some(nth);
        self
    }

    pub fn leak_on_deallocation(mut self, nth: u64) -> Self {
        self.leak_on_deallocation = Some(nth);
        self
    }

    pub fn fail_aligned(mut self) -> Self {
        self.fail_aligned = true;
        self
    }

    pub fn phantom_leak_on_audit(mut self, nth: u64) -> Self {
        self.phantom_leak_on_audit = Some(nth);
        self
    }

    pub fn disable_leak_finding(mut self) -> Self {
        self.disable_leak_finding = true;
        self
    }
}

/// Id given to fabricated leaks.
pub const PHANTOM_REGION: RegionId = RegionId(u64::MAX);

/// A [`LeakRuntime`] that forwards to `R` except where the plan says otherwise.
#[derive(Debug)]
pub struct FaultInjector<R> {
    inner: R,
    plan: FaultPlan,
    allocations: u64,
    reallocations: u64,
    deallocations: u64,
    audits: u64,
    injected: u64,
}

impl<R: LeakRuntime> FaultInjector<R> {
    pub fn new(inner: R, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan,
            allocations: 0,
            reallocations: 0,
            deallocations: 0,
            audits: 0,
            injected: 0,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn plan(&self) -> &FaultPlan {
        &self.plan
    }

    /// Number of faults actually injected so far.
    pub fn injected_faults(&self) -> u64 {
        self.injected
    }

    /// Count an allocation request; `true` if it should fail.
    fn next_allocation_fails(&mut self) -> bool {
        self.allocations += 1;
        let fail = self.plan.fail_allocation == Some(self.allocations);
        if fail {
            self.injected += 1;
            debug!(nth = self.allocations, "injecting allocation failure");
        }
        fail
    }
}

impl<R: LeakRuntime> LeakRuntime for FaultInjector<R> {
    fn leak_finding_enabled(&self) -> bool {
        self.inner.leak_finding_enabled()
    }

    fn allocate(&mut self, size: usize) -> Option<RegionHandle> {
        if self.next_allocation_fails() {
            return None;
        }
        self.inner.allocate(size)
    }

    fn allocate_aligned(&mut self, size: usize, align: usize) -> Option<AlignedHandle> {
        if self.plan.fail_aligned {
            self.injected += 1;
            return None;
        }
        self.inner.allocate_aligned(size, align)
    }

    fn deallocate_aligned(&mut self, handle: AlignedHandle) {
        self.inner.deallocate_aligned(handle);
    }

    fn allocate_copy_of(&mut self, s: &str) -> Option<RegionHandle> {
        if self.next_allocation_fails() {
            return None;
        }
        self.inner.allocate_copy_of(s)
    }

    fn allocate_bounded_copy_of(&mut self, s: &str, max_len: usize) -> Option<RegionHandle> {
        if self.next_allocation_fails() {
            return None;
        }
        self.inner.allocate_bounded_copy_of(s, max_len)
    }

    fn reallocate(
        &mut self,
        handle: RegionHandle,
        new_size: usize,
    ) -> Result<RegionHandle, RegionHandle> {
        if self.next_allocation_fails() {
            return Err(handle);
        }
        self.reallocations += 1;
        if self.plan.leak_on_reallocation == Some(self.reallocations) {
            let Some(fresh) = self.inner.allocate(new_size) else {
                return Err(handle);
            };
            debug!(predecessor = %handle.id(), "leaking reallocation predecessor");
            self.injected += 1;
            drop(handle);
            return Ok(fresh);
        }
        self.inner.reallocate(handle, new_size)
    }

    fn deallocate(&mut self, handle: RegionHandle) {
        self.deallocations += 1;
        if self.plan.leak_on_deallocation == Some(self.deallocations) {
            debug!(region = %handle.id(), "leaking instead of releasing");
            self.injected += 1;
            drop(handle);
            return;
        }
        self.inner.deallocate(handle);
    }

    fn usable_size(&self, handle: &RegionHandle) -> usize {
        self.inner.usable_size(handle)
    }

    fn audit_for_leaks(&mut self) -> LeakReport {
        self.audits += 1;
        let mut report = self.inner.audit_for_leaks();
        if self.plan.phantom_leak_on_audit == Some(self.audits) {
            self.injected += 1;
            report.push(LeakedRegion {
                id: PHANTOM_REGION,
                addr: 0,
                size: 0,
                kind: AllocKind::Plain,
            });
        }
        report
    }
}

/// Wraps a provider so its runtime comes up inside a [`FaultInjector`].
#[derive(Clone, Debug)]
pub struct FaultyProvider<P> {
    inner: P,
    plan: FaultPlan,
}

impl<P: RuntimeProvider> FaultyProvider<P> {
    pub fn new(inner: P, plan: FaultPlan) -> Self {
        Self { inner, plan }
    }
}

impl<P: RuntimeProvider> RuntimeProvider for FaultyProvider<P> {
    type Runtime = FaultInjector<P::Runtime>;

    fn enable_leak_finding(&mut self, enabled: bool) {
        self.inner
            .enable_leak_finding(enabled && !self.plan.disable_leak_finding);
    }

    fn init(self) -> Self::Runtime {
        FaultInjector::new(self.inner.init(), self.plan)
    }
}
