//! Analytics engine
//!
//! The engine is the only entry point callers need: it owns the document
//! source, the cache and the change coordinator, and exposes every analysis
//! as an accessor that checks the cache first.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       ANALYTICS ENGINE                           │
//! │                                                                  │
//! │  accessor ──► fingerprint ──► AnalyticsCache ──► hit: clone out  │
//! │                                     │                            │
//! │                                   miss                           │
//! │                                     ▼                            │
//! │  DocumentSource ──► aggregate / stats / streak ──► cache.set     │
//! │                                                                  │
//! │  notify(ChangeEvent) ──► ChangeCoordinator ──► invalidate        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Accessors never fail. A source that cannot enumerate its documents is
//! logged and treated as an empty corpus; unreadable documents fall back to
//! a size estimate.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wordtrail_core::analytics::{AnalyticsEngine, Granularity, Metric};
//! use wordtrail_core::source::FsDocumentSource;
//! use wordtrail_core::Config;
//!
//! # async fn run() -> wordtrail_core::Result<()> {
//! let source = Arc::new(FsDocumentSource::new("/home/me/notes"));
//! let engine = AnalyticsEngine::with_system_clock(source, Config::load()?);
//!
//! let weeks = engine.get_buckets(Granularity::Week, None).await;
//! let trend = engine.get_trend(Metric::Words).await;
//! println!("{} weeks, words {:?}", weeks.len(), trend.direction);
//! # Ok(())
//! # }
//! ```

use crate::analytics::buckets::{
    aggregate, average_words, count_document_words, densify_daily, filter_by_range,
    AggregateOptions, Bucket, Granularity,
};
use crate::analytics::metric::Metric;
use crate::analytics::stats::{
    consistency_score, correlations, predict, seasonal_bias, trend_for, CorrelationResult,
    Prediction, SeasonalPattern, TrendResult,
};
use crate::analytics::streak::{active_days, compute_streaks, StreakState};
use crate::cache::{fingerprint, AnalyticsCache, CachePartition, CacheStats, SharedCache};
use crate::changes::{ChangeCoordinator, ChangeEvent, CorpusVersion};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, TtlClass};
use crate::error::Result;
use crate::source::DocumentSource;
use crate::types::{DateRange, DocumentRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Documents modified within this many days can count as growing.
const GROWING_WINDOW_DAYS: i64 = 7;

// ============================================
// Result types
// ============================================

/// Corpus-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub total_words: u64,
    pub total_files: u64,
    /// Rounded mean words per document
    pub avg_words_per_file: u64,
    /// Earliest document creation
    pub first_created: Option<DateTime<Utc>>,
    /// Latest document modification
    pub last_modified: Option<DateTime<Utc>>,
}

/// Totals for one period of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub range: DateRange,
    pub total_words: u64,
    pub files_created: u64,
}

/// Period-over-period comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub current: PeriodTotals,
    pub previous: PeriodTotals,
    /// Percent change in words (positive = more)
    pub words_delta_pct: f64,
    /// Percent change in documents created
    pub files_delta_pct: f64,
}

impl PeriodComparison {
    /// Calculate percentage change between two values.
    ///
    /// Growth from zero is reported as 100%.
    pub fn calc_delta(current: u64, previous: u64) -> f64 {
        if previous == 0 {
            if current == 0 {
                0.0
            } else {
                100.0
            }
        } else {
            (current as f64 - previous as f64) / previous as f64 * 100.0
        }
    }

    /// Format delta for display (e.g., "+23%" or "-15%").
    pub fn format_delta(delta: f64) -> String {
        if delta >= 0.0 {
            format!("+{:.0}%", delta)
        } else {
            format!("{:.0}%", delta)
        }
    }
}

/// Totals for one top-level folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStats {
    pub folder: String,
    pub total_words: u64,
    pub files: u64,
    pub avg_words_per_file: u64,
}

// ============================================
// Engine
// ============================================

/// Cached analytics over a document corpus.
pub struct AnalyticsEngine {
    source: Arc<dyn DocumentSource>,
    config: Config,
    clock: Arc<dyn Clock>,
    cache: SharedCache,
    version: Arc<CorpusVersion>,
    changes: ChangeCoordinator,
}

impl AnalyticsEngine {
    /// Create an engine. Must be called inside a tokio runtime, since the
    /// change coordinator spawns its debounce task.
    pub fn new(source: Arc<dyn DocumentSource>, config: Config, clock: Arc<dyn Clock>) -> Self {
        let cache = SharedCache::new(AnalyticsCache::new(
            Arc::clone(&clock),
            config.cache.max_entries,
            config.cache.max_memory_bytes,
        ));
        let version = Arc::new(CorpusVersion::new());
        let changes = ChangeCoordinator::new(
            cache.clone(),
            Arc::clone(&version),
            config.changes.debounce(),
        );

        tracing::debug!(
            max_entries = config.cache.max_entries,
            max_memory_bytes = config.cache.max_memory_bytes,
            debounce_ms = config.changes.debounce_ms,
            "Analytics engine created"
        );

        Self {
            source,
            config,
            clock,
            cache,
            version,
            changes,
        }
    }

    /// Create an engine on the wall clock.
    pub fn with_system_clock(source: Arc<dyn DocumentSource>, config: Config) -> Self {
        Self::new(source, config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Corpus generation; bumped whenever documents are added or removed.
    pub fn generation(&self) -> u64 {
        self.version.generation()
    }

    // ---------------- Buckets ----------------

    /// Documents grouped by creation window, ascending by key.
    ///
    /// `range` restricts documents by creation day. With
    /// [`Granularity::Custom`] and a range the result is a single bucket.
    pub async fn get_buckets(
        &self,
        granularity: Granularity,
        range: Option<DateRange>,
    ) -> Vec<Bucket> {
        let params = format!("{}:{}", granularity.as_str(), range_param(range));
        let slot = self.slot(CachePartition::Counts, "buckets", &params);
        if let Some(buckets) = self.cached::<Vec<Bucket>>(&slot) {
            return buckets;
        }

        let documents = self.scan_documents().await;
        let buckets = aggregate(
            &self.source,
            &documents,
            granularity,
            range,
            self.options(),
        )
        .await;

        let class = if range.is_some() {
            TtlClass::Range
        } else {
            TtlClass::Granularity
        };
        self.store(&slot, &buckets, class);
        buckets
    }

    // ---------------- Series analyses ----------------

    /// Linear trend of `metric` over the analysis window.
    pub async fn get_trend(&self, metric: Metric) -> TrendResult {
        let window = self.analysis_window();
        let slot = self.slot(
            CachePartition::Analytics,
            "trend",
            &series_param(metric, window),
        );
        if let Some(trend) = self.cached::<TrendResult>(&slot) {
            return trend;
        }

        let buckets = self.window_buckets(window).await;
        let trend = trend_for(&metric.series(&buckets));
        self.store(&slot, &trend, TtlClass::Granularity);
        trend
    }

    /// Next-week and next-month projection of `metric`.
    pub async fn get_prediction(&self, metric: Metric) -> Prediction {
        let window = self.analysis_window();
        let slot = self.slot(
            CachePartition::Analytics,
            "prediction",
            &series_param(metric, window),
        );
        if let Some(prediction) = self.cached::<Prediction>(&slot) {
            return prediction;
        }

        let buckets = self.window_buckets(window).await;
        let prediction = predict(&metric.series(&buckets));
        self.store(&slot, &prediction, TtlClass::Granularity);
        prediction
    }

    /// Pairwise correlations between words, documents and average length.
    pub async fn get_correlations(&self) -> Vec<CorrelationResult> {
        let window = self.analysis_window();
        let slot = self.slot(CachePartition::Analytics, "correlations", &window.label());
        if let Some(results) = self.cached::<Vec<CorrelationResult>>(&slot) {
            return results;
        }

        let buckets = self.window_buckets(window).await;
        let series: Vec<(Metric, Vec<f64>)> = Metric::CORRELATED
            .iter()
            .map(|m| (*m, m.series(&buckets)))
            .collect();
        let results = correlations(&series);
        self.store(&slot, &results, TtlClass::Granularity);
        results
    }

    /// Weekday/weekend imbalance of `metric`, if any.
    pub async fn get_seasonal_pattern(&self, metric: Metric) -> Option<SeasonalPattern> {
        let window = self.analysis_window();
        let slot = self.slot(
            CachePartition::Analytics,
            "seasonal",
            &series_param(metric, window),
        );
        if let Some(pattern) = self.cached::<Option<SeasonalPattern>>(&slot) {
            return pattern;
        }

        let buckets = self.window_buckets(window).await;
        let series: Vec<_> = buckets.iter().map(|b| (b.start, metric.value(b))).collect();
        let pattern = seasonal_bias(&series);
        self.store(&slot, &pattern, TtlClass::Granularity);
        pattern
    }

    /// Consistency of `metric` over the analysis window, 0–100.
    pub async fn get_consistency(&self, metric: Metric) -> u8 {
        let window = self.analysis_window();
        let slot = self.slot(
            CachePartition::Analytics,
            "consistency",
            &series_param(metric, window),
        );
        if let Some(score) = self.cached::<u8>(&slot) {
            return score;
        }

        let buckets = self.window_buckets(window).await;
        let score = consistency_score(&metric.series(&buckets));
        self.store(&slot, &score, TtlClass::Granularity);
        score
    }

    // ---------------- Totals ----------------

    /// Streaks of active days as of today.
    pub fn get_streak(&self) -> StreakState {
        let today = self.clock.today();
        let slot = self.slot(CachePartition::Streak, "streak", &today.to_string());
        if let Some(state) = self.cached::<StreakState>(&slot) {
            return state;
        }

        let days = active_days(&self.documents(), self.clock.offset());
        let state = compute_streaks(&days, today);
        self.store(&slot, &state, TtlClass::Totals);
        state
    }

    /// Corpus-wide word and document totals.
    pub async fn get_summary(&self) -> CorpusSummary {
        let slot = self.slot(CachePartition::Summary, "totals", "all");
        if let Some(summary) = self.cached::<CorpusSummary>(&slot) {
            return summary;
        }

        let documents = self.scan_documents().await;
        let words = count_document_words(
            &self.source,
            &documents,
            self.config.aggregation.batch_size,
        )
        .await;

        let total_words: u64 = words.iter().sum();
        let total_files = documents.len() as u64;
        let summary = CorpusSummary {
            total_words,
            total_files,
            avg_words_per_file: average_words(total_words, total_files),
            first_created: documents.iter().map(|d| d.created_at).min(),
            last_modified: documents.iter().map(|d| d.modified_at).max(),
        };

        self.store(&slot, &summary, TtlClass::Totals);
        summary
    }

    // ---------------- Range analyses ----------------

    /// Compare words and documents created in two periods.
    pub async fn compare_periods(
        &self,
        current: DateRange,
        previous: DateRange,
    ) -> PeriodComparison {
        let params = format!("{}|{}", current.label(), previous.label());
        let slot = self.slot(CachePartition::Comparison, "periods", &params);
        if let Some(comparison) = self.cached::<PeriodComparison>(&slot) {
            return comparison;
        }

        let current = self.period_totals(current).await;
        let previous = self.period_totals(previous).await;
        let comparison = PeriodComparison {
            words_delta_pct: PeriodComparison::calc_delta(
                current.total_words,
                previous.total_words,
            ),
            files_delta_pct: PeriodComparison::calc_delta(
                current.files_created,
                previous.files_created,
            ),
            current,
            previous,
        };

        self.store(&slot, &comparison, TtlClass::Range);
        comparison
    }

    /// Word totals per top-level folder, largest first.
    pub async fn get_folder_breakdown(&self, range: Option<DateRange>) -> Vec<FolderStats> {
        let slot = self.slot(CachePartition::Breakdown, "folders", &range_param(range));
        if let Some(folders) = self.cached::<Vec<FolderStats>>(&slot) {
            return folders;
        }

        let documents = self.scan_documents().await;
        let documents = filter_by_range(&documents, range, self.clock.offset());
        let words = count_document_words(
            &self.source,
            &documents,
            self.config.aggregation.batch_size,
        )
        .await;

        let mut grouped: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for (doc, words) in documents.iter().zip(words) {
            let entry = grouped.entry(doc.folder()).or_default();
            entry.0 += words;
            entry.1 += 1;
        }

        let mut folders: Vec<FolderStats> = grouped
            .into_iter()
            .map(|(folder, (total_words, files))| FolderStats {
                folder: folder.to_string(),
                total_words,
                files,
                avg_words_per_file: average_words(total_words, files),
            })
            .collect();
        folders.sort_by(|a, b| {
            b.total_words
                .cmp(&a.total_words)
                .then_with(|| a.folder.cmp(&b.folder))
        });

        self.store(&slot, &folders, TtlClass::Range);
        folders
    }

    /// Large documents modified in the last week, most recent first.
    ///
    /// Size is a stand-in for growth; no history of earlier sizes is kept.
    pub fn growing_documents(&self) -> Vec<DocumentRecord> {
        let since = self.clock.now() - chrono::Duration::days(GROWING_WINDOW_DAYS);
        let threshold = self.config.aggregation.large_document_bytes;

        let mut growing: Vec<DocumentRecord> = self
            .documents()
            .into_iter()
            .filter(|d| d.size_bytes > threshold && d.modified_at >= since)
            .collect();
        growing.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.path.cmp(&b.path))
        });
        growing
    }

    // ---------------- Cache and changes ----------------

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Report a change to the corpus or settings.
    pub fn notify(&self, event: ChangeEvent) {
        self.changes.handle(&event);
    }

    /// Apply a debounced invalidation immediately, if one is waiting.
    pub fn flush_pending_changes(&self) -> bool {
        self.changes.flush_pending()
    }

    /// Stop background work. Accessors keep working afterwards, but
    /// modifications are no longer invalidated.
    pub fn shutdown(&self) {
        self.changes.shutdown();
        tracing::debug!("Analytics engine shut down");
    }

    // ---------------- Internals ----------------

    /// Enumerate documents on the calling thread.
    ///
    /// Only the synchronous accessors use this; a filesystem source walks
    /// its directory tree here.
    fn documents(&self) -> Vec<DocumentRecord> {
        corpus_or_empty(self.source.documents())
    }

    /// Enumerate documents on the blocking pool.
    async fn scan_documents(&self) -> Vec<DocumentRecord> {
        let source = Arc::clone(&self.source);
        match tokio::task::spawn_blocking(move || source.documents()).await {
            Ok(result) => corpus_or_empty(result),
            Err(e) => {
                tracing::error!(error = %e, "Document scan task failed, treating corpus as empty");
                Vec::new()
            }
        }
    }

    fn options(&self) -> AggregateOptions {
        AggregateOptions {
            batch_size: self.config.aggregation.batch_size,
            offset: self.clock.offset(),
        }
    }

    fn analysis_window(&self) -> DateRange {
        DateRange::trailing(
            self.clock.today(),
            self.config.aggregation.analysis_window_days,
        )
    }

    /// Dense daily buckets over `window`.
    async fn window_buckets(&self, window: DateRange) -> Vec<Bucket> {
        let daily = self.get_buckets(Granularity::Day, Some(window)).await;
        densify_daily(&daily, window)
    }

    async fn period_totals(&self, range: DateRange) -> PeriodTotals {
        let buckets = self.get_buckets(Granularity::Custom, Some(range)).await;
        PeriodTotals {
            range,
            total_words: buckets.iter().map(|b| b.total_words).sum(),
            files_created: buckets.iter().map(|b| b.files_created).sum(),
        }
    }

    fn slot(&self, partition: CachePartition, operation: &str, params: &str) -> CacheSlot {
        CacheSlot {
            content_epoch: self.version.content_epoch(),
            key: fingerprint(partition, operation, params, self.version.generation()),
        }
    }

    fn cached<T: Clone + 'static>(&self, slot: &CacheSlot) -> Option<T> {
        self.cache.lock().get(&slot.key)
    }

    /// Cache a result unless document content changed while it was computed.
    ///
    /// The epoch check and the insert happen under the cache lock, which the
    /// debounced invalidation also holds while bumping the epoch.
    fn store<T>(&self, slot: &CacheSlot, value: &T, class: TtlClass)
    where
        T: Clone + Serialize + Send + Sync + 'static,
    {
        let ttl = self.config.cache.ttl(class);
        let mut cache = self.cache.lock();
        if self.version.content_epoch() != slot.content_epoch {
            tracing::debug!(
                key = %slot.key,
                "Content changed during computation, not caching"
            );
            return;
        }
        cache.set(&slot.key, value, ttl);
    }
}

/// Where a result will be cached, and the content epoch it was computed under.
struct CacheSlot {
    key: String,
    content_epoch: u64,
}

impl Drop for AnalyticsEngine {
    fn drop(&mut self) {
        self.changes.shutdown();
    }
}

fn corpus_or_empty(result: Result<Vec<DocumentRecord>>) -> Vec<DocumentRecord> {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to enumerate documents, treating corpus as empty");
        Vec::new()
    })
}

fn range_param(range: Option<DateRange>) -> String {
    range.map_or_else(|| "all".to_string(), |r| r.label())
}

fn series_param(metric: Metric, window: DateRange) -> String {
    format!("{}:{}", metric.id(), window.label())
}
