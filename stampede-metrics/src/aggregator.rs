use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::outcome::RequestOutcome;
use crate::series::{MetricSeries, MetricSummary};

/// Thread-safe accumulator shared by all virtual users.
///
/// This is the single synchronization point of a run: `record` is a couple of
/// atomic increments plus a short reservoir lock, so it stays cheap at high
/// VU counts.
#[derive(Debug, Default)]
pub struct Aggregator {
    series: DashMap<Arc<str>, Arc<MetricSeries>>,
}

impl Aggregator {
    pub fn record(&self, outcome: &RequestOutcome) {
        let series = self.series(&outcome.metric);
        series.record(outcome.latency, outcome.is_error());
    }

    fn series(&self, name: &Arc<str>) -> Arc<MetricSeries> {
        if let Some(existing) = self.series.get(name) {
            return existing.clone();
        }
        self.series
            .entry(name.clone())
            .or_insert_with(|| Arc::new(MetricSeries::default()))
            .clone()
    }

    /// A consistent point-in-time view of every metric, recomputed on demand.
    #[must_use]
    pub fn snapshot(&self, elapsed: Duration) -> MetricsSnapshot {
        let mut metrics = BTreeMap::new();
        for entry in self.series.iter() {
            metrics.insert(entry.key().to_string(), entry.value().summarize());
        }

        MetricsSnapshot { elapsed, metrics }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub elapsed: Duration,
    pub metrics: BTreeMap<String, MetricSummary>,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&MetricSummary> {
        self.metrics.get(metric)
    }

    /// Recorded outcomes per second since run start. `None` for an unknown
    /// metric name.
    #[must_use]
    pub fn rate(&self, metric: &str) -> Option<f64> {
        let summary = self.get(metric)?;
        let secs = self.elapsed.as_secs_f64().max(1e-9);
        Some(summary.count as f64 / secs)
    }

    /// The p-th latency percentile for a metric. `None` when the metric is
    /// unknown or its reservoir is empty.
    #[must_use]
    pub fn percentile(&self, metric: &str, p: f64) -> Option<f64> {
        self.get(metric)?.percentile(p)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn outcome(metric: &str, ms: u64, ok: bool) -> RequestOutcome {
        if ok {
            RequestOutcome::ok(metric, 200, Duration::from_millis(ms))
        } else {
            RequestOutcome::transport_error(metric, Duration::from_millis(ms))
        }
    }

    #[test]
    fn rate_is_count_over_elapsed() {
        let agg = Aggregator::default();
        for _ in 0..10 {
            agg.record(&outcome("login", 5, true));
        }

        let snap = agg.snapshot(Duration::from_secs(2));
        assert_eq!(snap.get("login").unwrap().count, 10);
        assert_eq!(snap.rate("login"), Some(5.0));
    }

    #[test]
    fn unknown_metric_has_no_rate_or_percentile() {
        let snap = Aggregator::default().snapshot(Duration::from_secs(1));
        assert_eq!(snap.rate("nope"), None);
        assert_eq!(snap.percentile("nope", 95.0), None);
    }

    #[test]
    fn errors_are_attributed_to_the_named_metric_only() {
        let agg = Aggregator::default();
        agg.record(&outcome("a", 5, true));
        agg.record(&outcome("a", 5, false));
        agg.record(&outcome("b", 5, true));

        let snap = agg.snapshot(Duration::from_secs(1));
        assert_eq!(snap.get("a").unwrap().count, 2);
        assert_eq!(snap.get("a").unwrap().errors, 1);
        assert_eq!(snap.get("b").unwrap().count, 1);
        assert_eq!(snap.get("b").unwrap().errors, 0);
    }

    #[test]
    fn concurrent_recorders_account_exactly_once() {
        let agg = Arc::new(Aggregator::default());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let agg = agg.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    agg.record(&outcome("req", 1 + (i % 7), i % 5 != 0));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let snap = agg.snapshot(Duration::from_secs(1));
        let summary = snap.get("req").unwrap();
        assert_eq!(summary.count, 4_000);
        assert_eq!(summary.errors, 8 * 100);
    }

    #[test]
    fn failed_check_counts_as_error() {
        let agg = Aggregator::default();
        agg.record(&RequestOutcome::failed_check(
            "login",
            500,
            Duration::from_millis(3),
        ));

        let snap = agg.snapshot(Duration::from_secs(1));
        let summary = snap.get("login").unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.error_rate(), Some(1.0));
    }
}
