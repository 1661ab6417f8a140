//! Analytics module for wordtrail
//!
//! Provides time-bucketed statistics and insights including:
//! - Bucketing documents by day, ISO week, month, year or a custom range
//! - Trends, predictions, correlations, seasonal bias and consistency
//! - Writing streaks
//!
//! The pure computations live in [`buckets`], [`stats`] and [`streak`];
//! [`engine`] wires them to a document source and the cache.

pub mod buckets;
pub mod engine;
pub mod metric;
pub mod stats;
pub mod streak;

pub use buckets::{aggregate, densify_daily, AggregateOptions, Bucket, Granularity};
pub use engine::{AnalyticsEngine, CorpusSummary, FolderStats, PeriodComparison, PeriodTotals};
pub use metric::Metric;
pub use stats::{
    CorrelationResult, CorrelationStrength, Prediction, SeasonalBias, SeasonalPattern,
    TrendDirection, TrendResult, TrendStrength,
};
pub use streak::StreakState;
