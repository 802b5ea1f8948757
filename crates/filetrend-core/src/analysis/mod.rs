/// Analysis: name similarity, cross-period identity matching and trend
/// classification.
pub mod matcher;
pub mod similarity;
pub mod trend;

pub use matcher::{historical_mean, match_previous, HistoricalMean};
pub use similarity::similarity;
pub use trend::{build_trend_records, classify, round2};
