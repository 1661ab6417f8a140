//! Time-bucket aggregation
//!
//! Groups documents into calendar-aligned windows by creation day and fills
//! in per-bucket totals, averages and running cumulative totals.
//!
//! ## Bucket Keys
//!
//! | Granularity | Key | Window |
//! |-------------|-----|--------|
//! | `Day` | `2024-03-01` | one day |
//! | `Week` | `2024-W09` | ISO week, Monday through Sunday |
//! | `Month` | `2024-03` | calendar month |
//! | `Year` | `2024` | calendar year |
//! | `Custom` | `2024-03-01 to 2024-03-31` | the requested range |
//!
//! Keys are zero-padded, so for a fixed granularity lexicographic order is
//! chronological order.

use crate::source::DocumentSource;
use crate::types::{DateRange, DocumentRecord};
use crate::words::count_words;
use chrono::{Datelike, FixedOffset, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Default number of documents read concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Window size used to bucket documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
    /// One bucket spanning the requested range
    Custom,
}

impl Granularity {
    /// Parse a granularity name, falling back to [`Granularity::Day`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "day" | "daily" => Granularity::Day,
            "week" | "weekly" => Granularity::Week,
            "month" | "monthly" => Granularity::Month,
            "year" | "yearly" => Granularity::Year,
            "custom" | "range" => Granularity::Custom,
            other => {
                tracing::debug!(granularity = other, "Unsupported granularity, using daily");
                Granularity::Day
            }
        }
    }

    /// Stable name used in cache fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
            Granularity::Custom => "custom",
        }
    }

    /// Key and inclusive window for the bucket containing `day`.
    ///
    /// `Custom` has no window of its own; callers supply the range.
    fn window(&self, day: NaiveDate) -> (String, NaiveDate, NaiveDate) {
        match self {
            Granularity::Day | Granularity::Custom => {
                (day.format("%Y-%m-%d").to_string(), day, day)
            }
            Granularity::Week => {
                let iso = day.iso_week();
                let monday = NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon)
                    .unwrap_or(day);
                let sunday = monday + chrono::Duration::days(6);
                (format!("{}-W{:02}", iso.year(), iso.week()), monday, sunday)
            }
            Granularity::Month => {
                let first = day.with_day(1).unwrap_or(day);
                let next = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
                };
                let last = next.and_then(|n| n.pred_opt()).unwrap_or(day);
                (format!("{}-{:02}", first.year(), first.month()), first, last)
            }
            Granularity::Year => {
                let first = NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day);
                let last = NaiveDate::from_ymd_opt(day.year(), 12, 31).unwrap_or(day);
                (format!("{:04}", day.year()), first, last)
            }
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated metrics for one time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Window key (see module docs)
    pub key: String,
    /// First day of the window
    pub start: NaiveDate,
    /// Last day of the window (inclusive)
    pub end: NaiveDate,
    /// Words across documents created in the window
    pub total_words: u64,
    /// Documents created in the window
    pub files_created: u64,
    /// `round(total_words / files_created)`, 0 for an empty bucket
    pub avg_words_per_file: u64,
    /// Running total of words up to and including this bucket
    pub cumulative_words: u64,
    /// Running total of files up to and including this bucket
    pub cumulative_files: u64,
}

impl Bucket {
    fn empty(key: String, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            key,
            start,
            end,
            total_words: 0,
            files_created: 0,
            avg_words_per_file: 0,
            cumulative_words: 0,
            cumulative_files: 0,
        }
    }
}

/// Rounded mean words per file.
pub fn average_words(total_words: u64, files: u64) -> u64 {
    if files == 0 {
        0
    } else {
        (total_words as f64 / files as f64).round() as u64
    }
}

/// Tuning knobs for [`aggregate`].
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Documents read concurrently per batch; 0 is treated as 1
    pub batch_size: usize,
    /// Offset used to turn timestamps into calendar days
    pub offset: FixedOffset,
}

/// Documents whose creation day falls within `range` (all when `None`).
pub fn filter_by_range(
    documents: &[DocumentRecord],
    range: Option<DateRange>,
    offset: FixedOffset,
) -> Vec<DocumentRecord> {
    documents
        .iter()
        .filter(|d| range.map_or(true, |r| r.contains(d.created_day(offset))))
        .cloned()
        .collect()
}

/// Word count of each document, in input order.
///
/// Reads run concurrently within a batch and batches run one after another,
/// yielding in between. Unreadable documents fall back to
/// [`DocumentRecord::estimated_words`]; a task that fails outright counts 0.
pub async fn count_document_words(
    source: &Arc<dyn DocumentSource>,
    documents: &[DocumentRecord],
    batch_size: usize,
) -> Vec<u64> {
    let mut counts = vec![0u64; documents.len()];
    let batch_size = batch_size.max(1);

    for (batch_index, batch) in documents.chunks(batch_size).enumerate() {
        let base = batch_index * batch_size;
        let mut tasks = JoinSet::new();

        for (offset, doc) in batch.iter().enumerate() {
            let source = Arc::clone(source);
            let doc = doc.clone();
            tasks.spawn(async move {
                let words = match source.read_text(&doc.path).await {
                    Ok(text) => count_words(&text),
                    Err(e) => {
                        tracing::warn!(
                            path = %doc.path,
                            error = %e,
                            estimate = doc.estimated_words(),
                            "Failed to read document, using size estimate"
                        );
                        doc.estimated_words()
                    }
                };
                (base + offset, words)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, words)) => counts[index] = words,
                Err(e) => {
                    tracing::error!(error = %e, "Word count task failed, counting zero words");
                }
            }
        }

        tokio::task::yield_now().await;
    }

    counts
}

/// Group documents into buckets.
///
/// `range` filters documents by creation day (inclusive). With
/// [`Granularity::Custom`] every matching document lands in a single bucket
/// spanning the range; without a range, `Custom` behaves like `Day`.
pub async fn aggregate(
    source: &Arc<dyn DocumentSource>,
    documents: &[DocumentRecord],
    granularity: Granularity,
    range: Option<DateRange>,
    options: AggregateOptions,
) -> Vec<Bucket> {
    let selected = filter_by_range(documents, range, options.offset);
    let words = count_document_words(source, &selected, options.batch_size).await;

    let mut grouped: BTreeMap<String, Bucket> = BTreeMap::new();
    for (doc, words) in selected.iter().zip(words) {
        let day = doc.created_day(options.offset);
        let (key, start, end) = match (granularity, range) {
            (Granularity::Custom, Some(r)) => (r.label(), r.start(), r.end()),
            _ => granularity.window(day),
        };

        let bucket = grouped
            .entry(key.clone())
            .or_insert_with(|| Bucket::empty(key, start, end));
        bucket.total_words += words;
        bucket.files_created += 1;
    }

    let buckets = accumulate(grouped.into_values().collect());

    tracing::debug!(
        granularity = %granularity,
        documents = selected.len(),
        buckets = buckets.len(),
        "Aggregated documents"
    );

    buckets
}

/// Fill in averages and running totals over buckets sorted by key.
fn accumulate(mut buckets: Vec<Bucket>) -> Vec<Bucket> {
    buckets.sort_by(|a, b| a.key.cmp(&b.key));

    let mut cumulative_words = 0u64;
    let mut cumulative_files = 0u64;
    for bucket in &mut buckets {
        cumulative_words += bucket.total_words;
        cumulative_files += bucket.files_created;
        bucket.cumulative_words = cumulative_words;
        bucket.cumulative_files = cumulative_files;
        bucket.avg_words_per_file = average_words(bucket.total_words, bucket.files_created);
    }

    buckets
}

/// Dense daily series over `range`, inserting empty days.
///
/// `buckets` must be daily buckets; days outside the range are ignored.
/// Cumulative totals are recomputed from the first day of `range`, so they
/// count only what was created inside the window.
pub fn densify_daily(buckets: &[Bucket], range: DateRange) -> Vec<Bucket> {
    let by_day: BTreeMap<NaiveDate, &Bucket> = buckets.iter().map(|b| (b.start, b)).collect();

    let dense = range
        .days()
        .map(|day| match by_day.get(&day) {
            Some(bucket) => Bucket {
                cumulative_words: 0,
                cumulative_files: 0,
                ..(*bucket).clone()
            },
            None => {
                let (key, start, end) = Granularity::Day.window(day);
                Bucket::empty(key, start, end)
            }
        })
        .collect();

    accumulate(dense)
}
