use std::time::Duration;

use crate::error::{Error, Result};
use crate::thresholds::ThresholdRule;

/// Fixed parameters for one load-test run. Built once at startup and
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of concurrently running virtual users.
    pub vus: u64,
    /// Wall-clock run length. Workers check the deadline between iterations,
    /// so an iteration already in flight is allowed to finish.
    pub duration: Duration,
    /// Optional cap on total iterations across all virtual users.
    pub iterations: Option<u64>,
    /// Sleep between the end of one iteration and the start of the next.
    pub pause: Duration,
    pub thresholds: Vec<ThresholdRule>,
}

impl RunConfig {
    pub fn new(vus: u64, duration: Duration) -> Self {
        Self {
            vus,
            duration,
            iterations: None,
            pause: Duration::ZERO,
            thresholds: Vec::new(),
        }
    }

    #[must_use]
    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    #[must_use]
    pub fn iterations(mut self, iterations: Option<u64>) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn thresholds(mut self, thresholds: Vec<ThresholdRule>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Configuration errors are the only fatal errors of a run; everything
    /// that happens after scheduling starts is absorbed into metrics.
    pub fn validate(&self) -> Result<()> {
        if self.vus == 0 {
            return Err(Error::InvalidVus);
        }
        if self.duration.is_zero() {
            return Err(Error::InvalidDuration);
        }
        if self.iterations == Some(0) {
            return Err(Error::InvalidIterations);
        }
        Ok(())
    }
}
