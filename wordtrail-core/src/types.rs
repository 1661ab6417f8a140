//! Core domain types for wordtrail
//!
//! These types describe the corpus as the engine sees it. Documents are owned
//! by a [`DocumentSource`](crate::source::DocumentSource); everything derived
//! from them (buckets, trends, streaks) lives in [`analytics`](crate::analytics)
//! and is recomputed on demand.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Document** | A text file in the corpus, identified by its path |
//! | **Bucket** | Aggregated metrics for one calendar window |
//! | **Granularity** | The window size used to bucket documents |
//! | **Active day** | A calendar day on which any document was created or modified |
//! | **Streak** | A run of consecutive active days |

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Documents
// ============================================

/// A document as enumerated by the source. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identity of the document
    pub path: String,
    /// When the document was created
    pub created_at: DateTime<Utc>,
    /// Most recent modification
    pub modified_at: DateTime<Utc>,
    /// Size on disk, used to estimate words when content is unreadable
    pub size_bytes: u64,
}

impl DocumentRecord {
    /// Calendar day of creation in the given offset.
    pub fn created_day(&self, offset: FixedOffset) -> NaiveDate {
        self.created_at.with_timezone(&offset).date_naive()
    }

    /// Calendar day of last modification in the given offset.
    pub fn modified_day(&self, offset: FixedOffset) -> NaiveDate {
        self.modified_at.with_timezone(&offset).date_naive()
    }

    /// Leading path component, or `"/"` for documents at the root.
    pub fn folder(&self) -> &str {
        let trimmed = self.path.trim_start_matches('/');
        match trimmed.split_once('/') {
            Some((folder, _)) if !folder.is_empty() => folder,
            _ => "/",
        }
    }

    /// Word estimate used when content cannot be read.
    pub fn estimated_words(&self) -> u64 {
        self.size_bytes / 5
    }
}

// ============================================
// Date ranges
// ============================================

/// Inclusive range of calendar days.
///
/// Construction never fails: an inverted range is swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range, swapping the bounds if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            tracing::debug!(%start, %end, "Swapping inverted date range");
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// The `days` days ending on (and including) `end`.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self::new(end - chrono::Duration::days(span), end)
    }

    /// First day of the range.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `day` falls within the range.
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// Number of days covered, counting both ends.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Label used for custom-range bucket keys and cache fingerprints.
    pub fn label(&self) -> String {
        format!(
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}
