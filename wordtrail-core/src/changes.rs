//! Corpus change handling
//!
//! Maps change notifications onto cache invalidation:
//!
//! | Event | Bumped | Invalidated | When |
//! |-------|--------|-------------|------|
//! | `Created`, `Deleted` | generation | every document-derived partition | immediately |
//! | `Modified` | content epoch | content partitions | after the debounce window |
//! | `SettingsChanged` | content epoch | everything | immediately |
//!
//! Modifications arrive in bursts while a document is being edited, so they
//! share one debounced invalidation instead of clearing the cache per save.
//!
//! The content epoch is bumped while the cache lock is held. A result
//! computed under an older epoch is never stored after the invalidation.

use crate::cache::{CachePartition, SharedCache};
use crate::debounce::Debouncer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A change to the document corpus or its settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A document was added (path)
    Created(String),
    /// A document's text changed (path)
    Modified(String),
    /// A document was removed (path)
    Deleted(String),
    /// Settings affecting analytics changed
    SettingsChanged,
}

impl ChangeEvent {
    fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Created(_) => "created",
            ChangeEvent::Modified(_) => "modified",
            ChangeEvent::Deleted(_) => "deleted",
            ChangeEvent::SettingsChanged => "settings_changed",
        }
    }
}

/// Counters identifying the state of the corpus.
///
/// `generation` tracks membership and is part of every cache key.
/// `content_epoch` tracks document text; it is compared when a result is
/// stored rather than baked into keys, so a modify only drops content
/// partitions.
#[derive(Debug, Default)]
pub struct CorpusVersion {
    generation: AtomicU64,
    content_epoch: AtomicU64,
}

impl CorpusVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn content_epoch(&self) -> u64 {
        self.content_epoch.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn bump_content_epoch(&self) -> u64 {
        self.content_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Routes change events to the cache.
pub struct ChangeCoordinator {
    cache: SharedCache,
    version: Arc<CorpusVersion>,
    debouncer: Debouncer,
}

impl ChangeCoordinator {
    /// Create a coordinator. Must be called inside a tokio runtime.
    pub fn new(cache: SharedCache, version: Arc<CorpusVersion>, debounce: Duration) -> Self {
        let debounced_cache = cache.clone();
        let debounced_version = Arc::clone(&version);
        let debouncer = Debouncer::new(debounce, move || {
            let mut cache = debounced_cache.lock();
            let epoch = debounced_version.bump_content_epoch();
            let removed = cache.invalidate_partitions(&CachePartition::CONTENT);
            tracing::info!(
                removed,
                epoch,
                "Invalidated content analytics after modifications"
            );
        });

        Self {
            cache,
            version,
            debouncer,
        }
    }

    /// Apply one change event.
    pub fn handle(&self, event: &ChangeEvent) {
        tracing::debug!(kind = event.kind(), ?event, "Change event");

        match event {
            ChangeEvent::Created(_) | ChangeEvent::Deleted(_) => {
                let mut cache = self.cache.lock();
                let generation = self.version.bump_generation();
                let removed = cache.invalidate_partitions(&CachePartition::ALL);
                drop(cache);
                tracing::info!(
                    kind = event.kind(),
                    generation,
                    removed,
                    "Corpus changed, invalidated analytics"
                );
            }
            ChangeEvent::Modified(_) => self.debouncer.trigger(),
            ChangeEvent::SettingsChanged => {
                self.debouncer.cancel();
                let mut cache = self.cache.lock();
                self.version.bump_content_epoch();
                cache.clear();
                drop(cache);
                tracing::info!("Settings changed, cleared analytics cache");
            }
        }
    }

    /// Current corpus generation.
    pub fn generation(&self) -> u64 {
        self.version.generation()
    }

    /// Whether a debounced invalidation is waiting.
    pub fn has_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Run a waiting debounced invalidation now.
    pub fn flush_pending(&self) -> bool {
        self.debouncer.flush()
    }

    /// Stop the debounce task, discarding any pending invalidation.
    pub fn shutdown(&self) {
        self.debouncer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{fingerprint, AnalyticsCache};
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn shared_cache() -> SharedCache {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        SharedCache::new(AnalyticsCache::new(clock, 100, 1024 * 1024))
    }

    fn fill(cache: &SharedCache) {
        let mut cache = cache.lock();
        for partition in CachePartition::ALL {
            cache.set(
                &fingerprint(partition, "op", "all", 0),
                &1u64,
                Duration::from_secs(600),
            );
        }
    }

    #[tokio::test]
    async fn test_create_bumps_generation_and_invalidates() {
        let cache = shared_cache();
        let version = Arc::new(CorpusVersion::new());
        let coordinator =
            ChangeCoordinator::new(cache.clone(), version.clone(), Duration::from_secs(1));
        fill(&cache);

        coordinator.handle(&ChangeEvent::Created("new.md".to_string()));
        assert_eq!(coordinator.generation(), 1);
        assert!(cache.lock().is_empty());

        fill(&cache);
        coordinator.handle(&ChangeEvent::Deleted("new.md".to_string()));
        assert_eq!(version.generation(), 2);
        assert_eq!(version.content_epoch(), 0);
        assert!(cache.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_modify_invalidates_after_debounce() {
        let cache = shared_cache();
        let coordinator = ChangeCoordinator::new(
            cache.clone(),
            Arc::new(CorpusVersion::new()),
            Duration::from_millis(1000),
        );
        fill(&cache);

        coordinator.handle(&ChangeEvent::Modified("a.md".to_string()));
        coordinator.handle(&ChangeEvent::Modified("a.md".to_string()));
        assert!(coordinator.has_pending());
        assert_eq!(cache.lock().len(), 6);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(!coordinator.has_pending());
        assert_eq!(coordinator.generation(), 0);
        let cache = cache.lock();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("comparison:op:all@g0"));
    }

    #[tokio::test]
    async fn test_settings_change_clears_everything() {
        let cache = shared_cache();
        let coordinator = ChangeCoordinator::new(
            cache.clone(),
            Arc::new(CorpusVersion::new()),
            Duration::from_secs(1),
        );
        fill(&cache);
        coordinator.handle(&ChangeEvent::Modified("a.md".to_string()));

        coordinator.handle(&ChangeEvent::SettingsChanged);
        assert!(cache.lock().is_empty());
        assert!(!coordinator.has_pending());
    }

    #[tokio::test]
    async fn test_flush_pending_runs_now() {
        let cache = shared_cache();
        let version = Arc::new(CorpusVersion::new());
        let coordinator =
            ChangeCoordinator::new(cache.clone(), version.clone(), Duration::from_secs(60));
        fill(&cache);

        coordinator.handle(&ChangeEvent::Modified("a.md".to_string()));
        assert_eq!(version.content_epoch(), 0);
        assert!(coordinator.flush_pending());
        assert_eq!(cache.lock().len(), 1);
        assert_eq!(version.content_epoch(), 1);
        assert_eq!(version.generation(), 0);

        coordinator.handle(&ChangeEvent::SettingsChanged);
        assert_eq!(version.content_epoch(), 2);
    }
}
