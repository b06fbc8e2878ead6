use std::fmt::Write as _;

use stampede_core::RunReport;

use super::OutputFormatter;
use crate::plan::ResolvedPlan;

pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, plan: &ResolvedPlan) {
        println!("target: {}", plan.workflow.base_url);
        println!(
            "plan: vus={} duration={} pause={} iterations={}",
            plan.run.vus,
            humantime::format_duration(plan.run.duration),
            humantime::format_duration(plan.run.pause),
            plan.run
                .iterations
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string()),
        );
        println!();
    }

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        print!("{}", render(report));
        Ok(())
    }
}

fn format_ms(value: Option<f64>) -> String {
    match value {
        Some(ms) => format!("{ms:.1}ms"),
        None => "n/a".to_string(),
    }
}

fn render(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  elapsed: {:.2}s  vus: {} (started {}, stopped {})  iterations: {}",
        report.elapsed.as_secs_f64(),
        report.vus,
        report.vus_started,
        report.vus_stopped,
        report.iterations
    )
    .ok();
    out.push('\n');

    for (name, m) in &report.snapshot.metrics {
        let rate = report.snapshot.rate(name).unwrap_or(0.0);
        writeln!(
            &mut out,
            "metric: {name}\n  requests: {} (failed {})  rate: {rate:.1}/s",
            m.count, m.errors
        )
        .ok();
        writeln!(
            &mut out,
            "  latency = p50={} p90={} p95={} p99={} avg={} min={} max={} (n={})",
            format_ms(m.percentile(50.0)),
            format_ms(m.percentile(90.0)),
            format_ms(m.percentile(95.0)),
            format_ms(m.percentile(99.0)),
            format_ms(m.avg_ms),
            format_ms(m.min_ms),
            format_ms(m.max_ms),
            m.count
        )
        .ok();
    }

    if !report.verdict.rules.is_empty() {
        out.push('\n');
        out.push_str("thresholds\n");
        for rule in &report.verdict.rules {
            let mark = if rule.passed { "ok" } else { "FAILED" };
            let observed = rule
                .observed
                .map_or_else(|| "no data".to_string(), |v| format!("{v:.2}"));
            writeln!(
                &mut out,
                "  [{mark}] {}: {} (observed {observed})",
                rule.metric, rule.expression
            )
            .ok();
        }
    }

    out.push('\n');
    writeln!(
        &mut out,
        "verdict: {}",
        if report.verdict.passed { "PASS" } else { "FAIL" }
    )
    .ok();

    out
}
