use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use stampede_http::HttpClient;
use stampede_metrics::{Aggregator, RequestOutcome};
use tokio::sync::Barrier;

use crate::config::RunConfig;
use crate::error::Result;
use crate::gate::IterationGate;
use crate::report::RunReport;
use crate::thresholds::evaluate_thresholds;
use crate::vu::{StartSignal, VuContext};

#[derive(Debug, Default)]
struct WorkerAccounting {
    started: AtomicU64,
    stopped: AtomicU64,
    iterations: AtomicU64,
}

/// Drive a full load-test run and produce its verdict.
///
/// The scenario is one iteration of the workload: it is handed the shared
/// transport and aggregator and returns the outcomes of every request it
/// issued. Request-level failures are expected to come back as outcomes, not
/// errors; nothing a scenario records can abort the run.
pub async fn run_load_test<F, Fut>(config: RunConfig, scenario: F) -> Result<RunReport>
where
    F: Fn(VuContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Vec<RequestOutcome>> + Send + 'static,
{
    config.validate()?;

    let client = Arc::new(HttpClient::default());
    let aggregator = Arc::new(Aggregator::default());
    let gate = Arc::new(IterationGate::new(config.duration, config.iterations));
    let accounting = Arc::new(WorkerAccounting::default());

    // All workers plus the runner itself.
    let vus = config.vus;
    let ready_barrier = Arc::new(Barrier::new(
        usize::try_from(vus).unwrap_or(usize::MAX).saturating_add(1),
    ));
    let start_signal = Arc::new(StartSignal::default());

    let mut handles = Vec::with_capacity(vus as usize);
    for vu_id in 1..=vus {
        let ctx = VuContext {
            vu_id,
            vus,
            client: client.clone(),
            aggregator: aggregator.clone(),
        };

        let scenario = scenario.clone();
        let gate = gate.clone();
        let accounting = accounting.clone();
        let ready_barrier = ready_barrier.clone();
        let start_signal = start_signal.clone();
        let pause = config.pause;

        handles.push(tokio::spawn(async move {
            ready_barrier.wait().await;
            start_signal.wait().await;

            accounting.started.fetch_add(1, Ordering::Relaxed);

            while gate.next() {
                let outcomes = scenario(ctx.clone()).await;
                for outcome in &outcomes {
                    ctx.aggregator.record(outcome);
                }
                accounting.iterations.fetch_add(1, Ordering::Relaxed);

                // Pause is spaced end-to-start: it begins when the iteration
                // finishes, never overlapping the next one.
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }

            accounting.stopped.fetch_add(1, Ordering::Relaxed);
        }));
    }

    // Block until every worker is parked at the start line, then begin timing.
    ready_barrier.wait().await;
    let started = Instant::now();
    gate.start_at(started);
    start_signal.start();

    for handle in handles {
        handle.await?;
    }

    let elapsed = started.elapsed();
    let snapshot = aggregator.snapshot(elapsed);
    let verdict = evaluate_thresholds(&config.thresholds, &snapshot);

    Ok(RunReport {
        vus,
        vus_started: accounting.started.load(Ordering::Relaxed),
        vus_stopped: accounting.stopped.load(Ordering::Relaxed),
        iterations: accounting.iterations.load(Ordering::Relaxed),
        elapsed,
        snapshot,
        verdict,
    })
}
