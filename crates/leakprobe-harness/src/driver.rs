//! The lifecycle driver.
//!
//! [`LifecycleDriver`] owns the runtime capability and the handle table
//! for the duration of a run. Each public operation is gated by
//! [`Phase::next`]; any error, including an out-of-order call, moves the
//! driver to [`Phase::Failed`] and every later call is rejected.

use std::time::{Duration, Instant};

use leakprobe_core::{AllocRequest, LeakReport, LeakRuntime, RegionHandle, RuntimeProvider};
use tracing::{debug, error, info, trace};

use crate::config::ProtocolConfig;
use crate::error::{AlignedFailure, Checkpoint, HarnessError};
use crate::metrics::{RunMetrics, RunReport};
use crate::phase::{Operation, Phase};
use crate::table::SlotTable;

/// Runs the allocation lifecycle protocol against a [`LeakRuntime`].
#[derive(Debug)]
pub struct LifecycleDriver<R: LeakRuntime> {
    runtime: R,
    config: ProtocolConfig,
    table: SlotTable,
    phase: Phase,
    audits_since_mutation: u32,
    metrics: RunMetrics,
}

impl<R: LeakRuntime> LifecycleDriver<R> {
    /// Validate `config`, enable leak finding on `provider` and initialize it.
    ///
    /// Leak finding is switched on before `init`, so the runtime sees it
    /// from its first allocation. A runtime that still reports leak
    /// finding off is rejected with [`HarnessError::LeakFindingDisabled`].
    pub fn initialize<P>(mut provider: P, config: ProtocolConfig) -> Result<Self, HarnessError>
    where
        P: RuntimeProvider<Runtime = R>,
    {
        config.validate()?;
        provider.enable_leak_finding(true);
        let runtime = provider.init();
        if !runtime.leak_finding_enabled() {
            error!("runtime initialized without leak finding");
            return Err(HarnessError::LeakFindingDisabled);
        }
        debug!(slots = config.slot_count, "runtime initialized");
        Ok(Self {
            runtime,
            table: SlotTable::new(config.slot_count),
            config,
            phase: Phase::Initialized,
            audits_since_mutation: 0,
            metrics: RunMetrics::default(),
        })
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The handle table.
    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    /// The runtime under test.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Mutable access to the runtime, for tests that seed region contents.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Counters so far.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// The validated configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    // ── Protocol operations ────────────────────────────────────────

    /// Allocate the aligned probe, check its address and release it.
    ///
    /// The probe never enters the table.
    pub fn probe_aligned_allocation(&mut self) -> Result<(), HarnessError> {
        self.step(Operation::ProbeAligned, |d| {
            let (size, align) = (d.config.probe_size, d.config.probe_align);
            let Some(handle) = d.runtime.allocate_aligned(size, align) else {
                return Err(HarnessError::AlignedAllocationFailed {
                    size,
                    align,
                    reason: AlignedFailure::Null,
                });
            };
            d.metrics.allocations += 1;
            let addr = handle.addr();
            d.runtime.deallocate_aligned(handle);
            if addr % align != 0 {
                return Err(HarnessError::AlignedAllocationFailed {
                    size,
                    align,
                    reason: AlignedFailure::Misaligned { addr },
                });
            }
            debug!(size, align, addr, "aligned probe released");
            Ok(())
        })
    }

    /// Fill every slot: a copy of the special literal in slot 0, plain
    /// allocations elsewhere, each followed by a usable-size query.
    pub fn populate(&mut self) -> Result<(), HarnessError> {
        self.step(Operation::Populate, |d| {
            for slot in d.config.populate_range() {
                let fresh = if slot == ProtocolConfig::SPECIAL_SLOT {
                    Fresh::SpecialCopy
                } else {
                    Fresh::Plain {
                        size: d.config.plain_size(slot),
                    }
                };
                let handle = d.allocate_for(slot, fresh)?;
                d.install(slot, handle)?;
                d.check_usable_size(slot, fresh.request(&d.config))?;
            }
            debug!(occupied = d.table.occupied(), "populated");
            Ok(())
        })
    }

    /// Resize the reallocation batch: odd slots through the array form,
    /// even slots through the plain form.
    ///
    /// On failure the untouched original handle goes back into its slot.
    pub fn grow_or_shrink(&mut self) -> Result<(), HarnessError> {
        self.step(Operation::GrowOrShrink, |d| {
            for slot in d.config.realloc_range() {
                let handle = d.table.take(slot)?;
                let (request, result) = if slot % 2 == 1 {
                    let elem_size = d.config.array_elem_size;
                    (
                        AllocRequest::ReallocateArray {
                            count: slot,
                            elem_size,
                        },
                        d.runtime.reallocate_array(handle, slot, elem_size),
                    )
                } else {
                    let new_size = d.config.stride_size(slot);
                    (
                        AllocRequest::Reallocate { new_size },
                        d.runtime.reallocate(handle, new_size),
                    )
                };
                match result {
                    Ok(resized) => {
                        trace!(slot, %request, region = %resized.id(), "reallocated");
                        d.metrics.reallocations += 1;
                        d.install(slot, resized)?;
                    }
                    Err(original) => {
                        d.install(slot, original)?;
                        return Err(HarnessError::AllocationExhausted { slot, request });
                    }
                }
            }
            debug!(reallocations = d.metrics.reallocations, "reallocated");
            Ok(())
        })
    }

    /// Release every slot of the release batch, leaving each vacant.
    pub fn release(&mut self) -> Result<(), HarnessError> {
        self.step(Operation::Release, |d| {
            for slot in d.config.release_range() {
                let handle = d.table.take(slot)?;
                d.runtime.deallocate(handle);
                d.metrics.releases += 1;
            }
            debug!(occupied = d.table.occupied(), "released");
            Ok(())
        })
    }

    /// Refill the low slots: bounded copies of the bounded literal in the
    /// bounded-copy slots, plain allocations elsewhere.
    ///
    /// Slots that survived [`release`](Self::release) have their occupant
    /// released as the replacement is stored.
    pub fn repopulate(&mut self) -> Result<(), HarnessError> {
        self.step(Operation::Repopulate, |d| {
            let bounded = d.config.bounded_copy_slots();
            for slot in d.config.repopulate_range() {
                let fresh = if bounded.contains(&slot) {
                    Fresh::BoundedCopy { max_len: slot }
                } else {
                    Fresh::Plain {
                        size: d.config.plain_size(slot),
                    }
                };
                let handle = d.allocate_for(slot, fresh)?;
                d.install(slot, handle)?;
            }
            debug!(occupied = d.table.occupied(), "repopulated");
            Ok(())
        })
    }

    /// Run a full leak scan; any leak fails the run.
    ///
    /// Does not touch the handle table.
    pub fn audit(&mut self) -> Result<LeakReport, HarnessError> {
        self.step(Operation::Audit, |d| {
            let checkpoint = Checkpoint {
                phase: d.phase,
                pass: d.audits_since_mutation + 1,
            };
            let report = d.runtime.audit_for_leaks();
            if !report.is_clean() {
                return Err(HarnessError::LeakDetected { checkpoint, report });
            }
            d.metrics.audits += 1;
            debug!(%checkpoint, scanned = report.regions_scanned(), "audit clean");
            Ok(report)
        })
    }

    /// Close the run once every final audit has passed.
    pub fn finish(&mut self) -> Result<RunReport, HarnessError> {
        self.step(Operation::Finish, |d| Ok(d.report()))
    }

    /// Execute the whole protocol in order.
    pub fn run(&mut self) -> Result<RunReport, HarnessError> {
        let start = Instant::now();
        self.probe_aligned_allocation()?;
        self.populate()?;
        self.audit()?;
        self.grow_or_shrink()?;
        self.audit()?;
        self.release()?;
        self.repopulate()?;
        for _ in 0..self.config.final_audits {
            self.audit()?;
        }
        let mut report = self.finish()?;
        let elapsed_us = saturating_micros(start.elapsed());
        self.metrics.elapsed_us = elapsed_us;
        report.metrics.elapsed_us = elapsed_us;
        info!(
            audits = report.metrics.audits,
            occupied = report.occupied_slots,
            elapsed_us,
            "protocol succeeded"
        );
        Ok(report)
    }

    /// Release every occupied slot and hand the runtime back.
    pub fn teardown(mut self) -> R {
        for (slot, handle) in self.table.drain() {
            trace!(slot, region = %handle.id(), "teardown release");
            self.runtime.deallocate(handle);
        }
        self.runtime
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Gate `op` on the current phase, run it, and record the outcome.
    fn step<T>(
        &mut self,
        op: Operation,
        body: impl FnOnce(&mut Self) -> Result<T, HarnessError>,
    ) -> Result<T, HarnessError> {
        let Some(next) = self
            .phase
            .next(op, self.audits_since_mutation, self.config.final_audits)
        else {
            let phase = self.phase;
            return Err(self.fail(op, HarnessError::OutOfSequence { operation: op, phase }));
        };
        match body(self) {
            Ok(value) => {
                if op.is_mutation() {
                    self.audits_since_mutation = 0;
                } else if op == Operation::Audit {
                    self.audits_since_mutation += 1;
                }
                self.phase = next;
                Ok(value)
            }
            Err(e) => Err(self.fail(op, e)),
        }
    }

    fn fail(&mut self, op: Operation, e: HarnessError) -> HarnessError {
        error!(operation = %op, phase = %self.phase, "{e}");
        self.phase = Phase::Failed;
        e
    }

    /// Issue a fresh-allocation request for `slot`.
    fn allocate_for(&mut self, slot: usize, fresh: Fresh) -> Result<RegionHandle, HarnessError> {
        let handle = match fresh {
            Fresh::Plain { size } => self.runtime.allocate(size),
            Fresh::SpecialCopy => self.runtime.allocate_copy_of(&self.config.special_literal),
            Fresh::BoundedCopy { max_len } => self
                .runtime
                .allocate_bounded_copy_of(&self.config.bounded_literal, max_len),
        };
        let request = fresh.request(&self.config);
        let handle = handle.ok_or(HarnessError::AllocationExhausted { slot, request })?;
        trace!(slot, %request, region = %handle.id(), "allocated");
        self.metrics.allocations += 1;
        Ok(handle)
    }

    /// Store `handle` in `slot`, releasing whatever it displaces.
    fn install(&mut self, slot: usize, handle: RegionHandle) -> Result<(), HarnessError> {
        if let Some(displaced) = self.table.put(slot, handle)? {
            trace!(slot, region = %displaced.id(), "releasing displaced occupant");
            self.runtime.deallocate(displaced);
            self.metrics.displaced_releases += 1;
        }
        Ok(())
    }

    fn check_usable_size(&mut self, slot: usize, request: AllocRequest) -> Result<(), HarnessError> {
        let usable = self.runtime.usable_size(self.table.get(slot)?);
        self.metrics.usable_size_queries += 1;
        self.metrics.usable_bytes_observed += usable as u64;
        let requested = request.requested_bytes().unwrap_or(usize::MAX);
        if usable < requested {
            return Err(HarnessError::UsableSizeShort {
                slot,
                requested,
                usable,
            });
        }
        Ok(())
    }

    fn report(&self) -> RunReport {
        RunReport {
            metrics: self.metrics.clone(),
            occupied_slots: self.table.occupied(),
            slot_count: self.table.len(),
        }
    }
}

/// Whole microseconds in `elapsed`, saturating at `u64::MAX`.
fn saturating_micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

/// A request that creates a new region for a slot.
#[derive(Clone, Copy, Debug)]
enum Fresh {
    Plain { size: usize },
    SpecialCopy,
    BoundedCopy { max_len: usize },
}

impl Fresh {
    fn request(self, config: &ProtocolConfig) -> AllocRequest {
        match self {
            Self::Plain { size } => AllocRequest::Allocate { size },
            Self::SpecialCopy => AllocRequest::CopyOf {
                len: config.special_literal.len(),
            },
            Self::BoundedCopy { max_len } => AllocRequest::BoundedCopyOf {
                len: config.bounded_literal.len(),
                max_len,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leakprobe_heap::{HeapConfig, HeapProvider, TrackingHeap};

    fn driver() -> LifecycleDriver<TrackingHeap> {
        LifecycleDriver::initialize(HeapProvider::default(), ProtocolConfig::default()).unwrap()
    }

    fn probed() -> LifecycleDriver<TrackingHeap> {
        let mut d = driver();
        d.probe_aligned_allocation().unwrap();
        d
    }

    #[test]
    fn initialize_enables_leak_finding() {
        let d = driver();
        assert!(d.runtime().leak_finding_enabled());
        assert_eq!(d.phase(), Phase::Initialized);
        assert_eq!(d.table().len(), 100);
        assert_eq!(d.table().occupied(), 0);
    }

    #[test]
    fn invalid_config_rejected_before_init() {
        let result =
            LifecycleDriver::initialize(HeapProvider::default(), ProtocolConfig::new(3));
        assert!(matches!(result, Err(HarnessError::Config(_))));
    }

    #[test]
    fn full_run_succeeds() {
        let mut d = driver();
        let report = d.run().unwrap();
        assert_eq!(d.phase(), Phase::Succeeded);
        assert_eq!(report.slot_count, 100);
        assert_eq!(report.occupied_slots, 12);
        assert_eq!(report.metrics.audits, 5);
        assert_eq!(report.metrics.reallocations, 47);
        assert_eq!(report.metrics.releases, 98);
        assert_eq!(report.metrics.displaced_releases, 2);
        assert_eq!(report.metrics.usable_size_queries, 100);
        // probe + populate + repopulate
        assert_eq!(report.metrics.allocations, 1 + 100 + 12);

        let heap = d.teardown();
        assert_eq!(heap.live_regions(), 0);
        assert_eq!(heap.live_bytes(), 0);
        assert_eq!(heap.stats().leaks_reported, 0);
    }

    #[test]
    fn populate_fills_every_slot() {
        let mut d = probed();
        d.populate().unwrap();
        assert_eq!(d.table().occupied(), 100);
        let first = d.table().get(0).unwrap();
        assert_eq!(d.runtime().contents(first).unwrap(), b"abc\0");
        let last = d.table().get(99).unwrap();
        assert_eq!(d.runtime().contents(last).unwrap().len(), 103);
        assert!(d.metrics().usable_bytes_observed >= (4..=103).sum::<u64>());
    }

    #[test]
    fn reallocation_preserves_prefix() {
        let mut d = probed();
        d.populate().unwrap();
        let h5 = d.table().get(5).unwrap().id();
        {
            let LifecycleDriver { runtime, table, .. } = &mut d;
            let handle = table.get(5).unwrap();
            runtime.contents_mut(handle).unwrap().copy_from_slice(b"012345678");
        }
        d.audit().unwrap();
        d.grow_or_shrink().unwrap();

        let handle = d.table().get(5).unwrap();
        assert_ne!(handle.id(), h5);
        let bytes = d.runtime().contents(handle).unwrap();
        assert_eq!(bytes.len(), 5 * 43);
        assert_eq!(&bytes[..9], b"012345678");
        let even = d.table().get(4).unwrap();
        assert_eq!(d.runtime().contents(even).unwrap().len(), 65);
    }

    #[test]
    fn release_vacates_batch() {
        let mut d = probed();
        d.populate().unwrap();
        d.audit().unwrap();
        d.grow_or_shrink().unwrap();
        d.audit().unwrap();
        d.release().unwrap();
        assert_eq!(d.table().occupied(), 2);
        assert_eq!(d.table().get(2).unwrap_err(), HarnessError::SlotVacant { slot: 2 });
        assert!(d.table().is_occupied(0) && d.table().is_occupied(1));
    }

    #[test]
    fn repopulate_writes_bounded_copies() {
        let mut d = probed();
        d.populate().unwrap();
        d.audit().unwrap();
        d.grow_or_shrink().unwrap();
        d.audit().unwrap();
        d.release().unwrap();
        d.repopulate().unwrap();

        let expected: [&[u8]; 4] = [b"abc\0", b"abcd\0", b"abcd\0", b"abcd\0"];
        for (slot, want) in (3..=6).zip(expected) {
            let handle = d.table().get(slot).unwrap();
            assert_eq!(d.runtime().contents(handle).unwrap(), want, "slot {slot}");
        }
        let h11 = d.table().get(11).unwrap();
        assert_eq!(d.runtime().contents(h11).unwrap().len(), 15);
        assert_eq!(d.metrics().displaced_releases, 2);
        assert!(d.audit().unwrap().is_clean());
    }

    #[test]
    fn dropped_handle_fails_audit() {
        let mut d = probed();
        d.populate().unwrap();
        let stray = d.runtime_mut().allocate(32).unwrap();
        let stray_id = stray.id();
        drop(stray);

        let err = d.audit().unwrap_err();
        match &err {
            HarnessError::LeakDetected { checkpoint, report } => {
                assert_eq!(checkpoint.phase, Phase::Populated);
                assert_eq!(checkpoint.pass, 1);
                assert_eq!(report.leak_count(), 1);
                assert_eq!(report.leaks()[0].id, stray_id);
            }
            other => panic!("expected leak, got {other:?}"),
        }
        assert_eq!(d.phase(), Phase::Failed);
    }

    #[test]
    fn exhaustion_fails_run() {
        let provider = HeapProvider::new(HeapConfig::new(1024)).unwrap();
        let mut d = LifecycleDriver::initialize(provider, ProtocolConfig::default()).unwrap();
        let err = d.run().unwrap_err();
        assert!(err.is_exhaustion(), "{err}");
        assert_eq!(d.phase(), Phase::Failed);
        assert!(matches!(
            d.audit(),
            Err(HarnessError::OutOfSequence {
                operation: Operation::Audit,
                phase: Phase::Failed,
            })
        ));
    }

    #[test]
    fn mutation_without_audit_is_out_of_sequence() {
        let mut d = probed();
        d.populate().unwrap();
        assert_eq!(
            d.grow_or_shrink().unwrap_err(),
            HarnessError::OutOfSequence {
                operation: Operation::GrowOrShrink,
                phase: Phase::Populated,
            }
        );
        assert_eq!(d.phase(), Phase::Failed);
    }

    #[test]
    fn finish_before_final_audits_rejected() {
        let mut d = probed();
        d.populate().unwrap();
        d.audit().unwrap();
        d.grow_or_shrink().unwrap();
        d.audit().unwrap();
        d.release().unwrap();
        d.repopulate().unwrap();
        d.audit().unwrap();
        d.audit().unwrap();
        assert!(matches!(
            d.finish(),
            Err(HarnessError::OutOfSequence {
                operation: Operation::Finish,
                ..
            })
        ));
    }

    #[test]
    fn probe_leaves_no_region() {
        let mut d = driver();
        d.probe_aligned_allocation().unwrap();
        assert_eq!(d.phase(), Phase::Probed);
        assert_eq!(d.runtime().live_regions(), 0);
        assert_eq!(d.metrics().allocations, 1);
        assert_eq!(d.table().occupied(), 0);
    }

    #[test]
    fn teardown_after_failure_releases_table() {
        let mut d = probed();
        d.populate().unwrap();
        assert!(d.release().is_err());
        let heap = d.teardown();
        assert_eq!(heap.live_regions(), 0);
    }

    #[test]
    fn populate_before_probe_is_out_of_sequence() {
        let mut d = driver();
        assert_eq!(
            d.populate().unwrap_err(),
            HarnessError::OutOfSequence {
                operation: Operation::Populate,
                phase: Phase::Initialized,
            }
        );
        assert_eq!(d.table().occupied(), 0);
        assert_eq!(d.runtime().live_regions(), 0);
    }

    #[test]
    fn second_probe_is_out_of_sequence() {
        let mut d = probed();
        assert_eq!(
            d.probe_aligned_allocation().unwrap_err(),
            HarnessError::OutOfSequence {
                operation: Operation::ProbeAligned,
                phase: Phase::Probed,
            }
        );
        assert_eq!(d.metrics().allocations, 1);
    }

    #[test]
    fn elapsed_time_saturates() {
        assert_eq!(saturating_micros(Duration::from_micros(1500)), 1500);
        assert_eq!(saturating_micros(Duration::MAX), u64::MAX);
    }

    #[test]
    fn fresh_requests_describe_their_call() {
        let config = ProtocolConfig::default();
        assert_eq!(
            Fresh::SpecialCopy.request(&config),
            AllocRequest::CopyOf { len: 3 }
        );
        assert_eq!(
            Fresh::BoundedCopy { max_len: 3 }.request(&config),
            AllocRequest::BoundedCopyOf { len: 4, max_len: 3 }
        );
        assert_eq!(
            Fresh::Plain { size: 7 }.request(&config),
            AllocRequest::Allocate { size: 7 }
        );
        for fresh in [
            Fresh::SpecialCopy,
            Fresh::BoundedCopy { max_len: 5 },
            Fresh::Plain { size: 9 },
        ] {
            assert!(!fresh.request(&config).is_reallocation());
        }
    }
}
