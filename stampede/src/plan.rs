use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use stampede_core::{RunConfig, ThresholdRule};

use crate::cli::RunArgs;
use crate::workflow::WorkflowConfig;

const DEFAULT_VUS: u64 = 1;
const DEFAULT_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_PAUSE: Duration = Duration::from_secs(1);
const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "adminpass123";

/// On-disk plan file. Every field is optional; CLI flags win over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vus: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<YamlDuration>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pause: Option<YamlDuration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,

    /// Metric name to threshold expressions, e.g. `login: ["rate>100"]`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub thresholds: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl From<Duration> for YamlDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl Serialize for YamlDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(self.0).to_string())
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v < 0 {
                    return Err(E::custom("duration must not be negative"));
                }
                Ok(YamlDuration(Duration::from_secs(v as u64)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub async fn load_plan(path: &Path) -> anyhow::Result<PlanYaml> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read plan file: {}", path.display()))?;
    let plan: PlanYaml = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse plan file: {}", path.display()))?;
    Ok(plan)
}

/// Fully resolved inputs of one run.
#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    pub run: RunConfig,
    pub workflow: WorkflowConfig,
    pub output: crate::cli::OutputFormat,
}

/// Merge the plan file (if any) with CLI flags. CLI wins over the file;
/// CLI `--threshold` flags replace the file's threshold map entirely.
pub fn resolve(args: &RunArgs, file: PlanYaml) -> anyhow::Result<ResolvedPlan> {
    let base_url = args
        .base_url
        .clone()
        .or(file.base_url)
        .context("no target: set --base-url or `base_url` in the plan file")?;

    let username = args
        .username
        .clone()
        .or(file.username)
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
    let password = args
        .password
        .clone()
        .or(file.password)
        .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());

    let vus = args.vus.or(file.vus).unwrap_or(DEFAULT_VUS);
    let duration = args
        .duration
        .or(file.duration.map(YamlDuration::into_inner))
        .unwrap_or(DEFAULT_DURATION);
    let pause = args
        .pause
        .or(file.pause.map(YamlDuration::into_inner))
        .unwrap_or(DEFAULT_PAUSE);
    let iterations = args.iterations.or(file.iterations);

    let thresholds = if args.thresholds.is_empty() {
        let mut rules = Vec::new();
        for (metric, exprs) in &file.thresholds {
            for expr in exprs {
                rules.push(ThresholdRule::parse(metric.clone(), expr).with_context(|| {
                    format!("invalid threshold for metric `{metric}` in plan file")
                })?);
            }
        }
        rules
    } else {
        args.thresholds
            .iter()
            .map(|flag| ThresholdRule::parse(flag.metric.clone(), &flag.expr))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid --threshold flag")?
    };

    let run = RunConfig::new(vus, duration)
        .iterations(iterations)
        .pause(pause)
        .thresholds(thresholds);

    Ok(ResolvedPlan {
        run,
        workflow: WorkflowConfig::new(base_url, username, password),
        output: args.output,
    })
}
