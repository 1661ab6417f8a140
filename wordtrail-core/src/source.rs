//! Document sources
//!
//! The engine treats the corpus as an injected, read-only data source. A
//! source hands out a snapshot of [`DocumentRecord`]s and reads document text
//! on demand; reads may fail per document and the engine substitutes an
//! estimate when they do.
//!
//! ## Built-in Sources
//!
//! - [`MemoryDocumentSource`]: documents held in memory, with optional read
//!   failures for specific paths
//! - [`FsDocumentSource`]: files under a directory matching a glob pattern

use crate::error::{Error, Result};
use crate::types::DocumentRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// A read-only corpus of text documents.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use wordtrail_core::source::DocumentSource;
///
/// struct VaultSource { /* ... */ }
///
/// #[async_trait]
/// impl DocumentSource for VaultSource {
///     fn documents(&self) -> Result<Vec<DocumentRecord>> {
///         // enumerate the vault
///         Ok(vec![])
///     }
///
///     async fn read_text(&self, path: &str) -> Result<String> {
///         // fetch the note body
///         Ok(String::new())
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Snapshot of every document currently in the corpus.
    ///
    /// May block (a directory walk, say). The engine's async accessors call
    /// it on tokio's blocking pool.
    fn documents(&self) -> Result<Vec<DocumentRecord>>;

    /// Read the text of one document.
    ///
    /// Failures are expected for individual documents (permissions, binary
    /// content, deleted mid-scan) and must not be fatal to callers.
    async fn read_text(&self, path: &str) -> Result<String>;
}

// ============================================
// In-memory source
// ============================================

#[derive(Debug, Clone)]
struct StoredDocument {
    record: DocumentRecord,
    text: String,
}

/// Documents held in memory.
///
/// Useful for embedding the engine over an existing document store and for
/// tests. Paths registered with [`fail_reads_for`](Self::fail_reads_for)
/// return an error from `read_text`.
#[derive(Debug, Default)]
pub struct MemoryDocumentSource {
    documents: RwLock<BTreeMap<String, StoredDocument>>,
    unreadable: RwLock<HashSet<String>>,
}

impl MemoryDocumentSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document. `size_bytes` is taken from the text.
    pub fn upsert(
        &self,
        path: &str,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        text: &str,
    ) {
        let record = DocumentRecord {
            path: path.to_string(),
            created_at,
            modified_at,
            size_bytes: text.len() as u64,
        };
        self.insert_record(record, text);
    }

    /// Insert a document with an explicit record (e.g. a size that disagrees
    /// with the text).
    pub fn insert_record(&self, record: DocumentRecord, text: &str) {
        let mut docs = self.documents.write().unwrap_or_else(|e| e.into_inner());
        docs.insert(
            record.path.clone(),
            StoredDocument {
                record,
                text: text.to_string(),
            },
        );
    }

    /// Remove a document. Returns whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        let mut docs = self.documents.write().unwrap_or_else(|e| e.into_inner());
        docs.remove(path).is_some()
    }

    /// Make reads of `path` fail.
    pub fn fail_reads_for(&self, path: &str) {
        let mut unreadable = self.unreadable.write().unwrap_or_else(|e| e.into_inner());
        unreadable.insert(path.to_string());
    }

    /// Number of documents held.
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    fn documents(&self) -> Result<Vec<DocumentRecord>> {
        let docs = self.documents.read().unwrap_or_else(|e| e.into_inner());
        Ok(docs.values().map(|d| d.record.clone()).collect())
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let unreadable = self
            .unreadable
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path);
        if unreadable {
            return Err(Error::document(path, "read failure"));
        }

        let docs = self.documents.read().unwrap_or_else(|e| e.into_inner());
        docs.get(path)
            .map(|d| d.text.clone())
            .ok_or_else(|| Error::document(path, "not found"))
    }
}

// ============================================
// Filesystem source
// ============================================

/// Files under a root directory matching a glob pattern.
///
/// Document paths are reported relative to the root with `/` separators, so
/// folder breakdowns are stable across platforms.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
    pattern: String,
}

impl FsDocumentSource {
    /// Default pattern: markdown files at any depth.
    pub const DEFAULT_PATTERN: &'static str = "**/*.md";

    /// Scan markdown files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_pattern(root, Self::DEFAULT_PATTERN)
    }

    /// Scan files under `root` matching `pattern` (relative to the root).
    pub fn with_pattern(root: impl Into<PathBuf>, pattern: &str) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.to_string(),
        }
    }

    /// Root directory of the corpus.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    fn documents(&self) -> Result<Vec<DocumentRecord>> {
        let full_pattern = self.root.join(&self.pattern);
        let pattern_str = full_pattern.to_string_lossy();

        let mut documents = Vec::new();
        for entry in glob::glob(&pattern_str)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let metadata = match std::fs::metadata(&path) {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to stat document");
                    continue;
                }
            };

            let now = Utc::now();
            let modified: DateTime<Utc> = metadata
                .modified()
                .ok()
                .map(DateTime::from)
                .unwrap_or(now);
            // Not every filesystem records birth time
            let created: DateTime<Utc> = metadata
                .created()
                .ok()
                .map(DateTime::from)
                .unwrap_or(modified);

            documents.push(DocumentRecord {
                path: self.relative_path(&path),
                created_at: created,
                modified_at: modified,
                size_bytes: metadata.len(),
            });
        }

        tracing::debug!(
            root = %self.root.display(),
            count = documents.len(),
            "Discovered documents"
        );
        Ok(documents)
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        tokio::fs::read_to_string(self.root.join(path))
            .await
            .map_err(|e| Error::document(path, e.to_string()))
    }
}
