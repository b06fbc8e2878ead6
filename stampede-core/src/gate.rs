use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared go/stop decision for all virtual users of a run.
///
/// The deadline is only consulted at iteration boundaries; an iteration that
/// is already in flight when it passes runs to completion, so the worst-case
/// overrun is one iteration.
#[derive(Debug)]
pub struct IterationGate {
    counter: AtomicU64,
    iterations: Option<u64>,
    duration: Duration,
    deadline: OnceLock<Instant>,
}

impl IterationGate {
    pub fn new(duration: Duration, iterations: Option<u64>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            iterations,
            duration,
            deadline: OnceLock::new(),
        }
    }

    /// Pin the deadline to `started + duration`. Idempotent.
    pub fn start_at(&self, started: Instant) {
        if self.deadline.get().is_some() {
            return;
        }
        let _ = self.deadline.set(started + self.duration);
    }

    pub fn start(&self) {
        self.start_at(Instant::now());
    }

    /// Whether the calling worker may begin another iteration.
    pub fn next(&self) -> bool {
        let now = Instant::now();

        // If the runner didn't explicitly set a start time, lazily initialize
        // the deadline from the first observed iteration.
        if self.deadline.get().is_none() {
            self.start_at(now);
        }

        if let Some(deadline) = self.deadline.get()
            && now >= *deadline
        {
            return false;
        }

        if let Some(total) = self.iterations {
            let idx = self.counter.fetch_add(1, Ordering::Relaxed);
            if idx >= total {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_once_the_deadline_passes() {
        let gate = IterationGate::new(Duration::from_millis(50), None);
        gate.start_at(Instant::now() - Duration::from_millis(100));
        assert!(!gate.next());
    }

    #[test]
    fn stays_open_before_the_deadline() {
        let gate = IterationGate::new(Duration::from_secs(60), None);
        gate.start();
        assert!(gate.next());
        assert!(gate.next());
    }

    #[test]
    fn iteration_budget_is_shared_across_callers() {
        let gate = IterationGate::new(Duration::from_secs(60), Some(3));
        gate.start();
        assert!(gate.next());
        assert!(gate.next());
        assert!(gate.next());
        assert!(!gate.next());
        assert!(!gate.next());
    }
}
