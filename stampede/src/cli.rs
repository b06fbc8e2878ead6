use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    let unit = unit_str.trim();
    match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

/// `METRIC:EXPR`, e.g. `login:rate>100` or `payslip:p(95)<1000`.
#[derive(Debug, Clone)]
pub struct ThresholdFlag {
    pub metric: String,
    pub expr: String,
}

fn parse_threshold_flag(input: &str) -> Result<ThresholdFlag, String> {
    let (metric, expr) = input
        .split_once(':')
        .ok_or_else(|| format!("invalid threshold '{input}' (expected METRIC:EXPR)"))?;

    let metric = metric.trim();
    if metric.is_empty() {
        return Err(format!("invalid threshold '{input}' (empty metric name)"));
    }

    // Validate the expression up front so bad syntax dies as a usage error.
    stampede_core::parse_threshold_expr(expr).map_err(|e| e.to_string())?;

    Ok(ThresholdFlag {
        metric: metric.to_string(),
        expr: expr.trim().to_string(),
    })
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit a JSON summary line (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stampede",
    author,
    version,
    about = "HTTP load-generation tool with threshold-gated verdicts",
    long_about = "stampede drives a target HTTP API with concurrent virtual users.\n\nEach iteration logs in, then fires a batch of authorized calls, records\nper-request outcomes, and at the end of the run evaluates thresholds\n(rate, latency percentiles, ...) into a pass/fail verdict reflected in\nthe exit code.",
    after_help = "Examples:\n  stampede run --base-url http://localhost:8080 --vus 100 --duration 30s\n  stampede run plan.yaml --threshold 'login:rate>100' --threshold 'payslip:p(95)<1000'\n  stampede run plan.yaml --output json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test
    #[command(
        long_about = "Run the built-in workflow against a target API.\n\nA YAML plan file may set every knob; CLI flags override values from the file."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Optional YAML plan file
    pub plan: Option<PathBuf>,

    /// Target API base URL (e.g. http://localhost:8080/external/api/v1)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Login username
    #[arg(long)]
    pub username: Option<String>,

    /// Login password
    #[arg(long)]
    pub password: Option<String>,

    /// Number of virtual users
    #[arg(long)]
    pub vus: Option<u64>,

    /// Test duration (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Cap on total iterations across all virtual users
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Pause between the end of one iteration and the start of the next
    #[arg(long, value_parser = parse_duration)]
    pub pause: Option<Duration>,

    /// Threshold rule (repeatable, METRIC:EXPR). When given, replaces
    /// the plan file's thresholds entirely.
    #[arg(long = "threshold", value_name = "METRIC:EXPR", value_parser = parse_threshold_flag)]
    pub thresholds: Vec<ThresholdFlag>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}
