use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use stampede_http::HttpClient;
use stampede_metrics::Aggregator;
use tokio::sync::Notify;

/// Opens the gate for all virtual users at once, after every worker is ready.
/// Keeps per-VU startup skew out of the measured run time.
#[derive(Debug, Default)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            // Register for the notification before re-checking the flag, so a
            // `start` landing between the check and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.started.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}


/// Everything a scenario iteration needs, passed explicitly so scenarios
/// stay testable without ambient globals.
#[derive(Debug, Clone)]
pub struct VuContext {
    /// 1-based id of this virtual user.
    pub vu_id: u64,
    /// Total virtual users in the run.
    pub vus: u64,
    /// Shared connection pool, safe for concurrent use by all workers.
    pub client: Arc<HttpClient>,
    pub aggregator: Arc<Aggregator>,
}
