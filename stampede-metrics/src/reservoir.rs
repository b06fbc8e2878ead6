use rand::Rng as _;

/// Number of latency samples kept per metric for percentile estimation.
///
/// Once full, new samples replace old ones with uniform probability
/// (Algorithm R), so the reservoir stays a representative sample of the whole
/// run while memory stays bounded regardless of run length.
pub const RESERVOIR_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct Reservoir {
    capacity: usize,
    seen: u64,
    samples: Vec<f64>,
}

impl Default for Reservoir {
    fn default() -> Self {
        Self::with_capacity(RESERVOIR_CAPACITY)
    }
}

impl Reservoir {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: 0,
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.seen = self.seen.saturating_add(1);
        if self.samples.len() < self.capacity {
            self.samples.push(value);
            return;
        }

        let slot = rand::thread_rng().gen_range(0..self.seen);
        if (slot as usize) < self.capacity {
            self.samples[slot as usize] = value;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total number of values ever offered, including ones no longer sampled.
    #[must_use]
    pub fn seen(&self) -> u64 {
        self.seen
    }

    #[must_use]
    pub fn sorted_samples(&self) -> Vec<f64> {
        let mut out = self.samples.clone();
        out.sort_by(f64::total_cmp);
        out
    }
}

/// The p-th percentile of an ascending sample slice, with linear
/// interpolation between the two nearest ranks. `None` for empty input.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0) * ((sorted.len() - 1) as f64);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }

    let weight = rank - (lo as f64);
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * weight)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn fills_up_to_capacity_without_replacement() {
        let mut r = Reservoir::with_capacity(8);
        for i in 0..8 {
            r.record(i as f64);
        }

        assert_eq!(r.len(), 8);
        assert_eq!(r.seen(), 8);
        assert_eq!(r.sorted_samples(), (0..8).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn stays_bounded_once_full() {
        let mut r = Reservoir::with_capacity(16);
        for i in 0..10_000 {
            r.record(i as f64);
        }

        assert_eq!(r.len(), 16);
        assert_eq!(r.seen(), 10_000);
    }

    #[test]
    fn ignores_non_finite_values() {
        let mut r = Reservoir::with_capacity(4);
        r.record(f64::NAN);
        r.record(f64::INFINITY);
        r.record(1.0);

        assert_eq!(r.len(), 1);
        assert_eq!(r.seen(), 1);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = [10.0, 20.0, 30.0, 40.0];

        assert_eq!(percentile(&sorted, 0.0), Some(10.0));
        assert_eq!(percentile(&sorted, 100.0), Some(40.0));
        assert_eq!(percentile(&sorted, 50.0), Some(25.0));
        // rank = 0.95 * 3 = 2.85 => 30 + 0.85 * 10
        let p95 = percentile(&sorted, 95.0).unwrap();
        assert!((p95 - 38.5).abs() < 1e-9);
    }

    #[test]
    fn percentile_is_monotonic_in_p() {
        let mut r = Reservoir::default();
        for i in 0..500 {
            r.record((i % 97) as f64);
        }

        let sorted = r.sorted_samples();
        let p50 = percentile(&sorted, 50.0).unwrap();
        let p95 = percentile(&sorted, 95.0).unwrap();
        let p99 = percentile(&sorted, 99.0).unwrap();
        assert!(p50 <= p95);
        assert!(p95 <= p99);
    }

    #[test]
    fn percentile_of_empty_is_none() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn single_sample_is_every_percentile() {
        let sorted = [42.0];
        assert_eq!(percentile(&sorted, 1.0), Some(42.0));
        assert_eq!(percentile(&sorted, 99.0), Some(42.0));
    }
}
