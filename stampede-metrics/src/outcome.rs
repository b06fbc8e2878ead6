use std::sync::Arc;
use std::time::Duration;

/// The result of one logical request, attributed to exactly one metric name.
///
/// Outcomes are handed to [`crate::Aggregator::record`] as they complete and
/// are never retained individually afterwards.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub metric: Arc<str>,
    /// HTTP status. `None` means the request failed at the transport level
    /// (timeout, connect error) before any response arrived.
    pub status: Option<u16>,
    pub latency: Duration,
    /// Whether the response passed the scenario's check (e.g. expected status).
    pub passed: bool,
}

impl RequestOutcome {
    pub fn ok(metric: impl Into<Arc<str>>, status: u16, latency: Duration) -> Self {
        Self {
            metric: metric.into(),
            status: Some(status),
            latency,
            passed: true,
        }
    }

    pub fn failed_check(metric: impl Into<Arc<str>>, status: u16, latency: Duration) -> Self {
        Self {
            metric: metric.into(),
            status: Some(status),
            latency,
            passed: false,
        }
    }

    pub fn transport_error(metric: impl Into<Arc<str>>, latency: Duration) -> Self {
        Self {
            metric: metric.into(),
            status: None,
            latency,
            passed: false,
        }
    }

    /// An outcome counts as an error when the transport failed or the check did.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_none() || !self.passed
    }
}
