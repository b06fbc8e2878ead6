use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::reservoir::{Reservoir, percentile};

/// Streaming accumulation for one metric name.
///
/// Counters are plain atomics; only the reservoir insert takes a lock, and
/// that critical section is a vector index write at worst.
#[derive(Debug)]
pub(crate) struct MetricSeries {
    count: AtomicU64,
    errors: AtomicU64,
    sum_us: AtomicU64,
    min_us: AtomicU64,
    max_us: AtomicU64,
    reservoir: Mutex<Reservoir>,
}

impl Default for MetricSeries {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
            min_us: AtomicU64::new(u64::MAX),
            max_us: AtomicU64::new(0),
            reservoir: Mutex::new(Reservoir::default()),
        }
    }
}

impl MetricSeries {
    pub(crate) fn record(&self, latency: Duration, is_error: bool) {
        self.count.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }

        let us = latency.as_micros().min(u128::from(u64::MAX)) as u64;
        self.sum_us.fetch_add(us, Ordering::Relaxed);
        update_min(&self.min_us, us);
        update_max(&self.max_us, us);

        let ms = latency.as_secs_f64() * 1000.0;
        self.reservoir.lock().record(ms);
    }

    pub(crate) fn summarize(&self) -> MetricSummary {
        let count = self.count.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let sum_us = self.sum_us.load(Ordering::Relaxed);
        let min_us = self.min_us.load(Ordering::Relaxed);
        let max_us = self.max_us.load(Ordering::Relaxed);

        let samples_ms = self.reservoir.lock().sorted_samples();

        MetricSummary {
            count,
            errors,
            avg_ms: (count > 0).then(|| sum_us as f64 / count as f64 / 1000.0),
            min_ms: (count > 0 && min_us != u64::MAX).then(|| min_us as f64 / 1000.0),
            max_ms: (count > 0).then(|| max_us as f64 / 1000.0),
            samples_ms,
        }
    }
}

fn update_min(slot: &AtomicU64, value: u64) {
    let mut cur = slot.load(Ordering::Relaxed);
    while value < cur {
        match slot.compare_exchange_weak(cur, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(v) => cur = v,
        }
    }
}

fn update_max(slot: &AtomicU64, value: u64) {
    let mut cur = slot.load(Ordering::Relaxed);
    while value > cur {
        match slot.compare_exchange_weak(cur, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(v) => cur = v,
        }
    }
}

/// Point-in-time view of one metric, as captured by a snapshot.
#[derive(Debug, Clone, Default)]
pub struct MetricSummary {
    pub count: u64,
    pub errors: u64,
    pub avg_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    /// Ascending latency samples (ms) from the bounded reservoir.
    pub samples_ms: Vec<f64>,
}

impl MetricSummary {
    /// The p-th latency percentile estimated from the reservoir.
    /// `None` when no samples were recorded; callers treat that as failure.
    #[must_use]
    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.samples_ms, p)
    }

    #[must_use]
    pub fn error_rate(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.errors as f64 / self.count as f64)
    }
}
