//! In-process stand-in for the payroll API that the built-in workflow
//! targets. Used by integration tests only.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_LOGIN: &str = "/external/api/v1/auth/login";
pub const PATH_ATTENDANCE: &str = "/external/api/v1/attendance";
pub const PATH_PAYSLIP: &str = "/external/api/v1/payroll/{payroll_id}/payslip";
pub const PATH_PAYSLIPS: &str = "/external/api/v1/payroll/{payroll_id}/payslips";
pub const PATH_SLOW: &str = "/slow";

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "adminpass123";
const TEST_TOKEN: &str = "testserver-access-token";

/// Knobs for shaping server behavior in tests.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Extra time the attendance endpoint waits before answering, for
    /// exercising one slow call among otherwise fast ones.
    pub attendance_delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
struct ServerState {
    stats: TestServerStats,
    options: ServerOptions,
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    logins_total: Arc<AtomicU64>,
    attendance_total: Arc<AtomicU64>,
    payslip_total: Arc<AtomicU64>,
    payslips_list_total: Arc<AtomicU64>,
    reimbursement_total: Arc<AtomicU64>,
    unauthorized_total: Arc<AtomicU64>,
}

impl TestServerStats {
    pub fn logins_total(&self) -> u64 {
        self.logins_total.load(Ordering::Relaxed)
    }

    pub fn attendance_total(&self) -> u64 {
        self.attendance_total.load(Ordering::Relaxed)
    }

    pub fn payslip_total(&self) -> u64 {
        self.payslip_total.load(Ordering::Relaxed)
    }

    pub fn payslips_list_total(&self) -> u64 {
        self.payslips_list_total.load(Ordering::Relaxed)
    }

    pub fn reimbursement_total(&self) -> u64 {
        self.reimbursement_total.load(Ordering::Relaxed)
    }

    pub fn unauthorized_total(&self) -> u64 {
        self.unauthorized_total.load(Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.logins_total()
            + self.attendance_total()
            + self.payslip_total()
            + self.payslips_list_total()
            + self.reimbursement_total()
            + self.unauthorized_total()
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ReimbursementRequest {
    date: String,
    amount: i64,
    description: String,
}

#[derive(Debug, Serialize)]
struct Payslip {
    id: String,
    amount_cents: i64,
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"))
}

async fn handle_login(State(state): State<ServerState>, body: Bytes) -> (StatusCode, Bytes) {
    state.stats.logins_total.fetch_add(1, Ordering::Relaxed);

    let req: LoginRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                envelope_error("invalid login payload"),
            );
        }
    };

    if req.username != TEST_USERNAME || req.password != TEST_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            envelope_error("invalid credentials"),
        );
    }

    // The real API answers with `access_token`; clients also accept `token`.
    let body = json!({ "data": { "access_token": TEST_TOKEN } });
    (StatusCode::OK, to_bytes(&body))
}

async fn handle_attendance(
    State(state): State<ServerState>,
    headers: HeaderMap,
    _body: Bytes,
) -> (StatusCode, Bytes) {
    if !bearer_ok(&headers) {
        state.stats.unauthorized_total.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::UNAUTHORIZED, envelope_error("missing token"));
    }
    state.stats.attendance_total.fetch_add(1, Ordering::Relaxed);

    if let Some(delay) = state.options.attendance_delay {
        sleep(delay).await;
    }

    let body = json!({ "data": { "status": "checked_in" } });
    (StatusCode::OK, to_bytes(&body))
}

async fn handle_payslip(
    State(state): State<ServerState>,
    Path(payroll_id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Bytes) {
    if !bearer_ok(&headers) {
        state.stats.unauthorized_total.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::UNAUTHORIZED, envelope_error("missing token"));
    }
    state.stats.payslip_total.fetch_add(1, Ordering::Relaxed);

    let body = json!({ "data": Payslip { id: payroll_id, amount_cents: 1_250_000 } });
    (StatusCode::OK, to_bytes(&body))
}

async fn handle_payslips(
    State(state): State<ServerState>,
    Path(_payroll_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Bytes) {
    if !bearer_ok(&headers) {
        state.stats.unauthorized_total.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::UNAUTHORIZED, envelope_error("missing token"));
    }

    let limit: usize = query
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    if limit == 0 || limit > 100 {
        return (StatusCode::BAD_REQUEST, envelope_error("invalid limit"));
    }
    state.stats.payslips_list_total.fetch_add(1, Ordering::Relaxed);

    let page: usize = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let items: Vec<Payslip> = (0..limit)
        .map(|i| Payslip {
            id: format!("payslip-{page}-{i}"),
            amount_cents: 1_000_000 + (i as i64) * 100,
        })
        .collect();

    let body = json!({ "data": items });
    (StatusCode::OK, to_bytes(&body))
}

async fn handle_reimbursement(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    if !bearer_ok(&headers) {
        state.stats.unauthorized_total.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::UNAUTHORIZED, envelope_error("missing token"));
    }

    let req: ReimbursementRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                envelope_error("invalid reimbursement payload"),
            );
        }
    };
    state.stats.reimbursement_total.fetch_add(1, Ordering::Relaxed);

    let body = json!({
        "data": {
            "date": req.date,
            "amount": req.amount,
            "description": req.description,
            "status": "pending",
        }
    });
    (StatusCode::OK, to_bytes(&body))
}

async fn handle_slow() -> &'static str {
    sleep(Duration::from_millis(200)).await;
    "slow"
}

fn envelope_error(msg: &str) -> Bytes {
    to_bytes(&json!({ "errors": { "request": [msg] } }))
}

fn to_bytes(value: &serde_json::Value) -> Bytes {
    match serde_json::to_vec(value) {
        Ok(v) => Bytes::from(v),
        Err(_) => Bytes::from_static(b"{}"),
    }
}

pub fn router(stats: TestServerStats, options: ServerOptions) -> Router {
    let state = ServerState { stats, options };
    Router::new()
        .route(PATH_LOGIN, post(handle_login))
        .route(PATH_ATTENDANCE, post(handle_attendance))
        .route(PATH_PAYSLIP, get(handle_payslip))
        .route(PATH_PAYSLIPS, get(handle_payslips))
        .route(
            "/external/api/v1/reimbursement",
            post(handle_reimbursement),
        )
        .route(PATH_SLOW, get(handle_slow))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), options);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");

        Ok(Self {
            addr,
            base_url,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL including the API prefix the workflow expects.
    pub fn api_base_url(&self) -> String {
        format!("{}/external/api/v1", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
