//! # wordtrail-core
//!
//! Core library for wordtrail - writing analytics over a corpus of text documents.
//!
//! This library provides:
//! - Markdown-aware word counting
//! - Time-bucketed aggregation and statistical analysis
//! - A bounded, TTL-based analytics cache
//! - Change-driven cache invalidation with debounced modifications
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Source:** documents enumerated and read by a [`DocumentSource`](source::DocumentSource)
//! - **Derived:** buckets, trends and streaks computed on demand
//! - **Cache:** derived results memoized until their TTL lapses or the corpus changes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wordtrail_core::analytics::{AnalyticsEngine, Granularity};
//! use wordtrail_core::source::FsDocumentSource;
//! use wordtrail_core::{ChangeEvent, Config};
//!
//! # async fn run() -> wordtrail_core::Result<()> {
//! // Load configuration
//! let config = Config::load()?;
//!
//! // Point the engine at a notes directory
//! let engine = AnalyticsEngine::with_system_clock(
//!     Arc::new(FsDocumentSource::new("/home/me/notes")),
//!     config,
//! );
//!
//! let months = engine.get_buckets(Granularity::Month, None).await;
//! engine.notify(ChangeEvent::Modified("journal/today.md".to_string()));
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use analytics::AnalyticsEngine;
pub use cache::{AnalyticsCache, CacheStats};
pub use changes::ChangeEvent;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
pub use words::count_words;

// Public modules
pub mod analytics;
pub mod cache;
pub mod changes;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod source;
pub mod types;
pub mod words;
