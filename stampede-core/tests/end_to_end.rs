#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::json;
use stampede_core::{HttpRequest, RequestOutcome, RunConfig, ThresholdRule, run_load_test};
use stampede_testserver::{TEST_PASSWORD, TEST_USERNAME, TestServer};

fn login_request(base_url: &str) -> HttpRequest {
    let body = json!({ "username": TEST_USERNAME, "password": TEST_PASSWORD });
    HttpRequest::post(
        format!("{base_url}/external/api/v1/auth/login"),
        Bytes::from(body.to_string()),
    )
    .header("content-type", "application/json")
}

#[tokio::test]
async fn run_against_live_server_evaluates_thresholds() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let base_url = server.base_url().to_string();

    let thresholds = vec![
        ThresholdRule::parse("login", "rate>1")?,
        ThresholdRule::parse("login", "p(99)<60000")?,
        ThresholdRule::parse("login", "rate>100000")?,
    ];
    let config = RunConfig::new(5, Duration::from_secs(1)).thresholds(thresholds);

    let report = run_load_test(config, move |ctx| {
        let base_url = base_url.clone();
        async move {
            let started = Instant::now();
            let outcome = match ctx.client.send(login_request(&base_url)).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    RequestOutcome::ok("login", resp.status, started.elapsed())
                }
                Ok(resp) => RequestOutcome::failed_check("login", resp.status, started.elapsed()),
                Err(_) => RequestOutcome::transport_error("login", started.elapsed()),
            };
            vec![outcome]
        }
    })
    .await?;

    let login = report.snapshot.get("login").expect("login metric recorded");
    assert_eq!(login.count, report.iterations);
    assert_eq!(login.errors, 0);
    assert_eq!(login.count, server.stats().logins_total());

    // A one second run with five workers comfortably clears one request per
    // second and never a hundred thousand.
    assert!(!report.verdict.passed);
    let rules = &report.verdict.rules;
    assert_eq!(rules.len(), 3);
    assert!(rules[0].passed, "rate>1 should hold: {:?}", rules[0]);
    assert!(rules[1].passed, "p(99)<60s should hold: {:?}", rules[1]);
    assert!(!rules[2].passed, "rate>100000 must fail: {:?}", rules[2]);
    assert!(rules[2].observed.is_some());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rule_on_unrecorded_metric_fails_the_run() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let base_url = server.base_url().to_string();

    let thresholds = vec![ThresholdRule::parse("checkout", "count>0")?];
    let config = RunConfig::new(1, Duration::from_millis(200)).thresholds(thresholds);

    let report = run_load_test(config, move |ctx| {
        let base_url = base_url.clone();
        async move {
            let started = Instant::now();
            let outcome = match ctx.client.send(login_request(&base_url)).await {
                Ok(resp) => RequestOutcome::ok("login", resp.status, started.elapsed()),
                Err(_) => RequestOutcome::transport_error("login", started.elapsed()),
            };
            vec![outcome]
        }
    })
    .await?;

    assert!(!report.verdict.passed);
    assert_eq!(report.verdict.rules.len(), 1);
    assert!(report.verdict.rules[0].observed.is_none());

    server.shutdown().await;
    Ok(())
}
