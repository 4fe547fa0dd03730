//! In-process metrics for the control plane components.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   ControlPlaneMetrics                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │  readiness   │  │  assignment  │  │ batch ops      │  │
//! │  │ - checks     │  │ - requests   │  │ - submitted    │  │
//! │  │ - not ready  │  │ - rejected   │  │ - conflicts    │  │
//! │  │ - timeouts   │  │              │  │ - done/failed  │  │
//! │  │ - latency    │  │              │  │ - live tasks   │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod instruments;

pub use instruments::{Counter, Gauge, Histogram, LATENCY_BUCKETS};

use std::time::Duration;

/// Metrics shared by the readiness checker, assigner and orchestrator.
#[derive(Debug)]
pub struct ControlPlaneMetrics {
    /// Readiness checks completed.
    pub readiness_checks: Counter,
    /// Checks that returned `Ready=false`.
    pub readiness_not_ready: Counter,
    /// Registry queries that timed out or failed.
    pub registry_unreachable: Counter,
    /// Readiness check latency.
    pub readiness_latency: Histogram,

    /// Assignments computed.
    pub assignments: Counter,
    /// Assignment requests rejected during validation.
    pub assignments_rejected: Counter,

    /// Batch operations accepted.
    pub batch_submitted: Counter,
    /// Submissions refused because the group was busy.
    pub batch_conflicts: Counter,
    /// Batch operations that finished successfully.
    pub batch_completed: Counter,
    /// Batch operations that failed.
    pub batch_failed: Counter,
    /// Batch operations currently live.
    pub batch_live: Gauge,
    /// Wall time of finished batch operations.
    pub batch_duration: Histogram,
}

impl Default for ControlPlaneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPlaneMetrics {
    pub fn new() -> Self {
        Self {
            readiness_checks: Counter::new("readiness_checks_total"),
            readiness_not_ready: Counter::new("readiness_not_ready_total"),
            registry_unreachable: Counter::new("registry_unreachable_total"),
            readiness_latency: Histogram::new("readiness_latency_seconds", LATENCY_BUCKETS),
            assignments: Counter::new("shard_assignments_total"),
            assignments_rejected: Counter::new("shard_assignments_rejected_total"),
            batch_submitted: Counter::new("batch_operations_submitted_total"),
            batch_conflicts: Counter::new("batch_operations_conflicts_total"),
            batch_completed: Counter::new("batch_operations_completed_total"),
            batch_failed: Counter::new("batch_operations_failed_total"),
            batch_live: Gauge::new("batch_operations_live"),
            batch_duration: Histogram::new("batch_operation_duration_seconds", LATENCY_BUCKETS),
        }
    }

    /// Record a finished batch operation.
    pub fn record_batch_finished(&self, succeeded: bool, duration: Duration) {
        if succeeded {
            self.batch_completed.inc();
        } else {
            self.batch_failed.inc();
        }
        self.batch_live.dec();
        self.batch_duration.observe(duration);
    }

    /// Take a point-in-time copy.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            readiness_checks: self.readiness_checks.get(),
            readiness_not_ready: self.readiness_not_ready.get(),
            registry_unreachable: self.registry_unreachable.get(),
            readiness_mean_latency: self.readiness_latency.mean(),
            assignments: self.assignments.get(),
            assignments_rejected: self.assignments_rejected.get(),
            batch_submitted: self.batch_submitted.get(),
            batch_conflicts: self.batch_conflicts.get(),
            batch_completed: self.batch_completed.get(),
            batch_failed: self.batch_failed.get(),
            batch_live: self.batch_live.get(),
        }
    }
}

/// Plain copy of [`ControlPlaneMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub readiness_checks: u64,
    pub readiness_not_ready: u64,
    pub registry_unreachable: u64,
    pub readiness_mean_latency: Duration,
    pub assignments: u64,
    pub assignments_rejected: u64,
    pub batch_submitted: u64,
    pub batch_conflicts: u64,
    pub batch_completed: u64,
    pub batch_failed: u64,
    pub batch_live: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_lifecycle_counters() {
        let metrics = ControlPlaneMetrics::new();
        metrics.batch_submitted.inc();
        metrics.batch_live.inc();
        metrics.batch_submitted.inc();
        metrics.batch_live.inc();

        metrics.record_batch_finished(true, Duration::from_millis(20));
        metrics.record_batch_finished(false, Duration::from_millis(40));

        let snap = metrics.snapshot();
        assert_eq!(snap.batch_submitted, 2);
        assert_eq!(snap.batch_completed, 1);
        assert_eq!(snap.batch_failed, 1);
        assert_eq!(snap.batch_live, 0);
    }
}
