//! The built-in scenario: authenticate, then hit the payroll API's
//! endpoints together in one concurrent batch, the way a logged-in user
//! fans out requests.

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::json;
use stampede_core::{HttpRequest, HttpResponse, RequestOutcome, VuContext};

pub const METRIC_LOGIN: &str = "login";
pub const METRIC_ATTENDANCE: &str = "attendance";
pub const METRIC_PAYSLIP: &str = "payslip";
pub const METRIC_PAYSLIPS_LIST: &str = "payslips_list";
pub const METRIC_REIMBURSEMENT: &str = "reimbursement";

const PAYROLL_ID: &str = "c7c50c3b-5d94-4aa1-b9df-17b5f184b5bb";
const TOTAL_PAYSLIPS: u64 = 100;

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Base URL up to and including the API prefix,
    /// e.g. `http://localhost:9000/external/api/v1`.
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl WorkflowConfig {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Pull the session token out of a login response body. The API has
/// answered with both `data.token` and `data.access_token` over time, so
/// accept either.
fn extract_token(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let data = value.get("data")?;
    data.get("token")
        .or_else(|| data.get("access_token"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Random page window over a fixed payslip population: page size 1..=10,
/// page 1..=ceil(total / page_size).
fn random_pagination<R: rand::Rng>(rng: &mut R) -> (u64, u64) {
    let limit = rng.gen_range(1..=10u64);
    let max_page = TOTAL_PAYSLIPS.div_ceil(limit);
    let page = rng.gen_range(1..=max_page);
    (limit, page)
}

fn json_post(url: String, body: serde_json::Value, token: &str) -> HttpRequest {
    HttpRequest::post(url, Bytes::from(body.to_string()))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
}

fn authorized_get(url: String, token: &str) -> HttpRequest {
    HttpRequest::get(url)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
}

fn outcome_for(
    metric: &'static str,
    result: &Result<HttpResponse, stampede_core::HttpError>,
    elapsed: Duration,
) -> RequestOutcome {
    match result {
        Ok(resp) if resp.status == 200 => RequestOutcome::ok(metric, resp.status, resp.latency),
        Ok(resp) => RequestOutcome::failed_check(metric, resp.status, resp.latency),
        Err(_) => RequestOutcome::transport_error(metric, elapsed),
    }
}

/// One full iteration. Always returns five outcomes: a failed login still
/// issues the batch with an empty token so downstream failures get counted
/// instead of skipped.
pub async fn run_iteration(cfg: &WorkflowConfig, ctx: &VuContext) -> Vec<RequestOutcome> {
    let base = &cfg.base_url;
    let mut outcomes = Vec::with_capacity(5);

    let login_body = json!({ "username": cfg.username, "password": cfg.password });
    let login_req = HttpRequest::post(
        format!("{base}/auth/login"),
        Bytes::from(login_body.to_string()),
    )
    .header("content-type", "application/json");

    let login_started = Instant::now();
    let login_result = ctx.client.send(login_req).await;
    outcomes.push(outcome_for(
        METRIC_LOGIN,
        &login_result,
        login_started.elapsed(),
    ));

    let token = login_result
        .ok()
        .and_then(|resp| extract_token(&resp.body))
        .unwrap_or_default();

    let (limit, page) = random_pagination(&mut rand::thread_rng());

    let reqs = vec![
        json_post(format!("{base}/attendance"), json!({}), &token),
        authorized_get(format!("{base}/payroll/{PAYROLL_ID}/payslip"), &token),
        authorized_get(
            format!("{base}/payroll/{PAYROLL_ID}/payslips?limit={limit}&page={page}"),
            &token,
        ),
        json_post(
            format!("{base}/reimbursement"),
            json!({
                "date": "2025-07-08",
                "amount": 2_000_000,
                "description": "Hotels Ticket",
            }),
            &token,
        ),
    ];

    let results = ctx.client.batch(reqs).await;

    let metrics = [
        METRIC_ATTENDANCE,
        METRIC_PAYSLIP,
        METRIC_PAYSLIPS_LIST,
        METRIC_REIMBURSEMENT,
    ];
    for (metric, (result, elapsed)) in metrics.into_iter().zip(&results) {
        outcomes.push(outcome_for(metric, result, *elapsed));
    }

    outcomes
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn extract_token_accepts_both_field_names() {
        let body = br#"{"data":{"access_token":"abc123"}}"#;
        assert_eq!(extract_token(body), Some("abc123".to_string()));

        let body = br#"{"data":{"token":"xyz"}}"#;
        assert_eq!(extract_token(body), Some("xyz".to_string()));

        // `token` wins when both are present.
        let body = br#"{"data":{"token":"a","access_token":"b"}}"#;
        assert_eq!(extract_token(body), Some("a".to_string()));
    }

    #[test]
    fn extract_token_rejects_malformed_bodies() {
        assert_eq!(extract_token(b"not json"), None);
        assert_eq!(extract_token(br#"{"data":{}}"#), None);
        assert_eq!(extract_token(br#"{"token":"top-level"}"#), None);
        assert_eq!(extract_token(br#"{"data":{"token":42}}"#), None);
    }

    #[test]
    fn pagination_stays_inside_the_population() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let (limit, page) = random_pagination(&mut rng);
            assert!((1..=10).contains(&limit));
            assert!(page >= 1);
            // The last page must still contain at least one payslip.
            assert!((page - 1) * limit < TOTAL_PAYSLIPS, "limit={limit} page={page}");
        }
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let cfg = WorkflowConfig::new("http://host/api/", "u", "p");
        assert_eq!(cfg.base_url, "http://host/api");
    }
}
