#![forbid(unsafe_code)]

mod aggregator;
mod outcome;
mod reservoir;
mod series;

pub use aggregator::{Aggregator, MetricsSnapshot};
pub use outcome::RequestOutcome;
pub use reservoir::{RESERVOIR_CAPACITY, Reservoir};
pub use series::MetricSummary;
