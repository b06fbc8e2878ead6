#![forbid(unsafe_code)]

mod config;
mod error;
mod gate;
mod report;
mod run;
mod thresholds;
mod vu;

pub use config::RunConfig;
pub use error::{Error, Result};
pub use gate::IterationGate;
pub use report::RunReport;
pub use run::run_load_test;
pub use thresholds::{
    RuleOutcome, ThresholdAgg, ThresholdExpr, ThresholdOp, ThresholdRule, Verdict,
    evaluate_thresholds, parse_threshold_expr,
};
pub use vu::VuContext;

pub use stampede_http::{Error as HttpError, HttpClient, HttpRequest, HttpResponse};
pub use stampede_metrics::{Aggregator, MetricsSnapshot, RequestOutcome};
