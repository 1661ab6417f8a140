//! Tracked metrics.
//!
//! Each variant knows how to read its value from a [`Bucket`], so series
//! analyses take a `Metric` rather than a metric-id string.

use super::buckets::Bucket;
use serde::{Deserialize, Serialize};

/// A per-bucket metric that can be turned into a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Words written in the bucket
    Words,
    /// Documents created in the bucket
    Files,
    /// Rounded mean words per document
    AverageWords,
    /// Running word total. Over an analysis window the sum starts at zero
    /// on the window's first day.
    CumulativeWords,
    /// Running document total, window-relative like `CumulativeWords`
    CumulativeFiles,
}

impl Metric {
    /// Every metric.
    pub const ALL: [Metric; 5] = [
        Metric::Words,
        Metric::Files,
        Metric::AverageWords,
        Metric::CumulativeWords,
        Metric::CumulativeFiles,
    ];

    /// Metrics correlated against each other. Cumulative totals are excluded
    /// since any two running sums correlate trivially.
    pub const CORRELATED: [Metric; 3] = [Metric::Words, Metric::Files, Metric::AverageWords];

    /// Stable identifier used in cache fingerprints.
    pub fn id(&self) -> &'static str {
        match self {
            Metric::Words => "words",
            Metric::Files => "files",
            Metric::AverageWords => "avg_words",
            Metric::CumulativeWords => "cumulative_words",
            Metric::CumulativeFiles => "cumulative_files",
        }
    }

    /// Value of this metric for one bucket.
    pub fn value(&self, bucket: &Bucket) -> f64 {
        let raw = match self {
            Metric::Words => bucket.total_words,
            Metric::Files => bucket.files_created,
            Metric::AverageWords => bucket.avg_words_per_file,
            Metric::CumulativeWords => bucket.cumulative_words,
            Metric::CumulativeFiles => bucket.cumulative_files,
        };
        raw as f64
    }

    /// Series of this metric over ordered buckets.
    pub fn series(&self, buckets: &[Bucket]) -> Vec<f64> {
        buckets.iter().map(|b| self.value(b)).collect()
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_metric_reads_bucket_fields() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bucket = Bucket {
            key: "2024-01-01".to_string(),
            start: day,
            end: day,
            total_words: 300,
            files_created: 2,
            avg_words_per_file: 150,
            cumulative_words: 900,
            cumulative_files: 5,
        };

        let values: Vec<f64> = Metric::ALL.iter().map(|m| m.value(&bucket)).collect();
        assert_eq!(values, vec![300.0, 2.0, 150.0, 900.0, 5.0]);
        assert_eq!(Metric::AverageWords.to_string(), "avg_words");
    }
}
