use std::collections::BTreeMap;
use std::io::Write as _;

use serde::Serialize;
use stampede_core::RunReport;

use super::OutputFormatter;
use crate::plan::ResolvedPlan;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan: &ResolvedPlan) {}

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        let line = build_summary_line(report);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub elapsed_secs: f64,
    pub vus: u64,
    pub vus_started: u64,
    pub vus_stopped: u64,
    pub iterations: u64,
    pub metrics: BTreeMap<String, JsonMetricSummary>,
    pub thresholds: Vec<JsonRuleOutcome>,
    pub passed: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonMetricSummary {
    pub count: u64,
    pub errors: u64,
    pub rate_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_avg_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_min_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_max_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_p50_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_p90_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_p95_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_p99_ms: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRuleOutcome {
    pub metric: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<f64>,
    pub passed: bool,
}

fn build_summary_line(report: &RunReport) -> JsonSummaryLine {
    let metrics = report
        .snapshot
        .metrics
        .iter()
        .map(|(name, m)| {
            let summary = JsonMetricSummary {
                count: m.count,
                errors: m.errors,
                rate_per_sec: report.snapshot.rate(name).unwrap_or(0.0),
                latency_avg_ms: m.avg_ms,
                latency_min_ms: m.min_ms,
                latency_max_ms: m.max_ms,
                latency_p50_ms: m.percentile(50.0),
                latency_p90_ms: m.percentile(90.0),
                latency_p95_ms: m.percentile(95.0),
                latency_p99_ms: m.percentile(99.0),
            };
            (name.clone(), summary)
        })
        .collect();

    let thresholds = report
        .verdict
        .rules
        .iter()
        .map(|r| JsonRuleOutcome {
            metric: r.metric.clone(),
            expression: r.expression.clone(),
            observed: r.observed,
            passed: r.passed,
        })
        .collect();

    JsonSummaryLine {
        kind: "summary",
        elapsed_secs: report.elapsed.as_secs_f64(),
        vus: report.vus,
        vus_started: report.vus_started,
        vus_stopped: report.vus_stopped,
        iterations: report.iterations,
        metrics,
        thresholds,
        passed: report.verdict.passed,
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let Ok(payload) = serde_json::to_string(line) else {
        return;
    };
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{payload}");
}
