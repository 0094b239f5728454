//! Counters collected while a run executes.
//!
//! [`RunMetrics`] is updated in place by every driver operation and is
//! readable at any point, including after a failure. [`RunReport`] is the
//! summary handed back by a successful run.

/// Per-run operation counters.
///
/// Durations are in microseconds. `elapsed_us` is only filled in by
/// [`LifecycleDriver::run`](crate::LifecycleDriver::run).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Successful allocation and copy requests, including the aligned probe.
    pub allocations: u64,
    /// Successful reallocations.
    pub reallocations: u64,
    /// Slots released by the release batch.
    pub releases: u64,
    /// Surviving occupants released to make room during repopulation.
    pub displaced_releases: u64,
    /// Usable-size queries issued.
    pub usable_size_queries: u64,
    /// Sum of every usable size observed, in bytes.
    pub usable_bytes_observed: u64,
    /// Clean audits completed.
    pub audits: u64,
    /// Wall-clock time of the whole run, in microseconds.
    pub elapsed_us: u64,
}

/// Summary of a run that reached [`Phase::Succeeded`](crate::Phase::Succeeded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Counters at the end of the run.
    pub metrics: RunMetrics,
    /// Slots still holding a handle when the run finished.
    pub occupied_slots: usize,
    /// Table length.
    pub slot_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = RunMetrics::default();
        assert_eq!(m.allocations, 0);
        assert_eq!(m.reallocations, 0);
        assert_eq!(m.releases, 0);
        assert_eq!(m.displaced_releases, 0);
        assert_eq!(m.usable_size_queries, 0);
        assert_eq!(m.usable_bytes_observed, 0);
        assert_eq!(m.audits, 0);
        assert_eq!(m.elapsed_us, 0);
    }

    #[test]
    fn report_carries_metrics() {
        let report = RunReport {
            metrics: RunMetrics {
                audits: 5,
                ..RunMetrics::default()
            },
            occupied_slots: 12,
            slot_count: 100,
        };
        assert_eq!(report.metrics.audits, 5);
        assert_eq!(report.occupied_slots, 12);
    }
}
