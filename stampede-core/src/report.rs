use std::time::Duration;

use stampede_metrics::MetricsSnapshot;

use crate::thresholds::Verdict;

/// Everything a run produced: the final snapshot, the threshold verdict, and
/// scheduler accounting. Handed to a reporter as-is.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub vus: u64,
    /// Workers that entered their iteration loop.
    pub vus_started: u64,
    /// Workers that reached their final state before the run returned.
    pub vus_stopped: u64,
    /// Completed scenario iterations across all workers.
    pub iterations: u64,
    pub elapsed: Duration,
    pub snapshot: MetricsSnapshot,
    pub verdict: Verdict,
}
