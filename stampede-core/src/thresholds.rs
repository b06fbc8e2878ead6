use stampede_metrics::MetricsSnapshot;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdAgg {
    /// Total recorded outcomes.
    Count,
    /// Outcomes per second since run start.
    Rate,
    /// Failed outcomes / total outcomes.
    ErrorRate,
    Avg,
    Min,
    Max,
    /// Latency percentile (1..=99), estimated from the reservoir.
    P(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

/// One declarative pass/fail condition over an aggregate metric.
/// Parsed up front so a malformed expression aborts before scheduling.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    pub metric: String,
    pub raw: String,
    pub expr: ThresholdExpr,
}

impl ThresholdRule {
    pub fn parse(metric: impl Into<String>, raw: &str) -> Result<Self> {
        Ok(Self {
            metric: metric.into(),
            raw: raw.to_string(),
            expr: parse_threshold_expr(raw)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub metric: String,
    pub expression: String,
    /// The resolved aggregate value. `None` when the metric had zero
    /// observations (missing series or empty reservoir) — always a failure.
    pub observed: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone)]
pub struct Verdict {
    pub rules: Vec<RuleOutcome>,
    /// Conjunction of all rules; an empty rule set passes.
    pub passed: bool,
}

pub fn parse_threshold_expr(raw: &str) -> Result<ThresholdExpr> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err(Error::InvalidThreshold("empty expression".to_string()));
    }

    // Two-char operators first so `<=` doesn't parse as `<`.
    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| Error::InvalidThreshold(format!("missing operator: {raw}")))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(Error::InvalidThreshold(raw.to_string()));
    }

    let agg = if left.eq_ignore_ascii_case("count") {
        ThresholdAgg::Count
    } else if left.eq_ignore_ascii_case("rate") {
        ThresholdAgg::Rate
    } else if left.eq_ignore_ascii_case("error_rate") {
        ThresholdAgg::ErrorRate
    } else if left.eq_ignore_ascii_case("avg") {
        ThresholdAgg::Avg
    } else if left.eq_ignore_ascii_case("min") {
        ThresholdAgg::Min
    } else if left.eq_ignore_ascii_case("max") {
        ThresholdAgg::Max
    } else if let Some(inner) = left.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
        let p: u32 = inner
            .parse()
            .map_err(|_| Error::InvalidThreshold(format!("invalid percentile: {raw}")))?;
        if !(1..=99).contains(&p) {
            return Err(Error::InvalidThreshold(format!(
                "percentile out of range: {raw}"
            )));
        }
        ThresholdAgg::P(p)
    } else {
        return Err(Error::InvalidThreshold(format!(
            "unknown aggregation `{left}`: {raw}"
        )));
    };

    let value: f64 = right
        .parse()
        .map_err(|_| Error::InvalidThreshold(format!("invalid numeric value: {raw}")))?;

    Ok(ThresholdExpr { agg, op, value })
}

/// Pure evaluation of every rule against a final snapshot.
///
/// A rule referencing a metric with zero observations fails; it is never
/// silently skipped.
#[must_use]
pub fn evaluate_thresholds(rules: &[ThresholdRule], snapshot: &MetricsSnapshot) -> Verdict {
    let mut out = Vec::with_capacity(rules.len());

    for rule in rules {
        let observed = observed_value(snapshot, &rule.metric, rule.expr.agg);
        let passed = observed
            .map(|v| compare(v, rule.expr.op, rule.expr.value))
            .unwrap_or(false);

        out.push(RuleOutcome {
            metric: rule.metric.clone(),
            expression: rule.raw.clone(),
            observed,
            passed,
        });
    }

    let passed = out.iter().all(|r| r.passed);
    Verdict { rules: out, passed }
}

fn compare(left: f64, op: ThresholdOp, right: f64) -> bool {
    match op {
        ThresholdOp::Lt => left < right,
        ThresholdOp::Lte => left <= right,
        ThresholdOp::Gt => left > right,
        ThresholdOp::Gte => left >= right,
    }
}

fn observed_value(snapshot: &MetricsSnapshot, metric: &str, agg: ThresholdAgg) -> Option<f64> {
    let summary = snapshot.get(metric)?;
    if summary.count == 0 {
        return None;
    }

    match agg {
        ThresholdAgg::Count => Some(summary.count as f64),
        ThresholdAgg::Rate => snapshot.rate(metric),
        ThresholdAgg::ErrorRate => summary.error_rate(),
        ThresholdAgg::Avg => summary.avg_ms,
        ThresholdAgg::Min => summary.min_ms,
        ThresholdAgg::Max => summary.max_ms,
        ThresholdAgg::P(p) => summary.percentile(f64::from(p)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use stampede_metrics::{Aggregator, RequestOutcome};
    use std::time::Duration;

    fn snapshot_with(metric: &str, n: u64, ms: u64, elapsed: Duration) -> MetricsSnapshot {
        let agg = Aggregator::default();
        for _ in 0..n {
            agg.record(&RequestOutcome::ok(metric, 200, Duration::from_millis(ms)));
        }
        agg.snapshot(elapsed)
    }

    #[test]
    fn parse_threshold_expr_trims_whitespace() {
        let expr = parse_threshold_expr("  p(95)  <  1000  ").unwrap();
        assert_eq!(expr.agg, ThresholdAgg::P(95));
        assert_eq!(expr.op, ThresholdOp::Lt);
        assert_eq!(expr.value, 1000.0);
    }

    #[test]
    fn parse_threshold_expr_rejects_junk() {
        assert!(parse_threshold_expr("").is_err());
        assert!(parse_threshold_expr("rate").is_err());
        assert!(parse_threshold_expr(">100").is_err());
        assert!(parse_threshold_expr("rate>").is_err());
        assert!(parse_threshold_expr("median>1").is_err());
        assert!(parse_threshold_expr("p(0)<1").is_err());
        assert!(parse_threshold_expr("p(100)<1").is_err());
        // Equality is not a supported comparator.
        assert!(parse_threshold_expr("rate==1").is_err());
    }

    #[test]
    fn rule_on_missing_metric_fails() {
        let rules = vec![ThresholdRule::parse("does_not_exist", "rate>0").unwrap()];
        let snapshot = Aggregator::default().snapshot(Duration::from_secs(1));

        let verdict = evaluate_thresholds(&rules, &snapshot);
        assert!(!verdict.passed);
        assert_eq!(verdict.rules.len(), 1);
        assert_eq!(verdict.rules[0].observed, None);
        assert!(!verdict.rules[0].passed);
    }

    #[test]
    fn empty_rule_set_passes() {
        let snapshot = Aggregator::default().snapshot(Duration::from_secs(1));
        let verdict = evaluate_thresholds(&[], &snapshot);
        assert!(verdict.passed);
        assert!(verdict.rules.is_empty());
    }

    #[test]
    fn rate_threshold_uses_count_over_elapsed() {
        let snapshot = snapshot_with("req", 100, 10, Duration::from_secs(2));

        let pass = ThresholdRule::parse("req", "rate>40").unwrap();
        let fail = ThresholdRule::parse("req", "rate>100").unwrap();
        let verdict = evaluate_thresholds(&[pass, fail], &snapshot);

        assert!(!verdict.passed);
        assert_eq!(verdict.rules[0].observed, Some(50.0));
        assert!(verdict.rules[0].passed);
        assert!(!verdict.rules[1].passed);
    }

    #[test]
    fn percentile_threshold_reads_the_reservoir() {
        let snapshot = snapshot_with("req", 50, 20, Duration::from_secs(1));

        let rules = vec![
            ThresholdRule::parse("req", "p(95)<1000").unwrap(),
            ThresholdRule::parse("req", "p(95)<5").unwrap(),
        ];
        let verdict = evaluate_thresholds(&rules, &snapshot);

        assert!(verdict.rules[0].passed);
        assert!(!verdict.rules[1].passed);
        assert!(!verdict.passed);
    }

    #[test]
    fn overall_pass_is_conjunction_of_rules() {
        let snapshot = snapshot_with("req", 10, 5, Duration::from_secs(1));

        let all_pass = vec![
            ThresholdRule::parse("req", "count>=10").unwrap(),
            ThresholdRule::parse("req", "error_rate<=0").unwrap(),
        ];
        assert!(evaluate_thresholds(&all_pass, &snapshot).passed);

        let one_fails = vec![
            ThresholdRule::parse("req", "count>=10").unwrap(),
            ThresholdRule::parse("req", "count>10").unwrap(),
        ];
        assert!(!evaluate_thresholds(&one_fails, &snapshot).passed);
    }
}
