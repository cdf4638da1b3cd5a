use super::{DocumentPath, DocumentStore, FieldValue};
use crate::record::CacheRecord;
use crate::Result;
use std::sync::Arc;

pub const LATEST_COLLECTION: &str = "context_cache";
pub const LATEST_DOCUMENT: &str = "latest";
pub const HISTORY_COLLECTION: &str = "context_caches_history";

/// Latest-pointer and history bookkeeping over any [`DocumentStore`].
#[derive(Clone)]
pub struct CacheRepository {
    store: Arc<dyn DocumentStore>,
}

impl CacheRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn latest_path() -> DocumentPath {
        DocumentPath::new(LATEST_COLLECTION, LATEST_DOCUMENT)
    }

    pub fn history_path(history_id: &str) -> DocumentPath {
        DocumentPath::new(HISTORY_COLLECTION, history_id)
    }

    /// Cache id named by the latest pointer, if any.
    ///
    /// A latest document without a string `cache_id` counts as no active cache.
    pub async fn active_cache_id(&self) -> Result<Option<String>> {
        let Some(doc) = self.store.get(&Self::latest_path()).await? else {
            return Ok(None);
        };
        match doc.get("cache_id") {
            Some(FieldValue::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
            _ => {
                tracing::warn!("latest document has no usable cache_id; treating as empty");
                Ok(None)
            }
        }
    }

    /// Append the history entry, then overwrite the latest pointer with the same data.
    pub async fn record_refresh(&self, history_id: &str, record: &CacheRecord) -> Result<DocumentPath> {
        let document = record.to_document();
        let history = Self::history_path(history_id);
        self.store.set(&history, &document).await?;
        tracing::info!(path = %history, "created historical record");
        self.store.set(&Self::latest_path(), &document).await?;
        tracing::info!(cache_id = %record.cache_id, "updated latest document");
        Ok(history)
    }

    pub async fn latest(&self) -> Result<Option<CacheRecord>> {
        self.store
            .get(&Self::latest_path())
            .await?
            .map(|doc| CacheRecord::from_document(&doc))
            .transpose()
    }

    /// Most recent history entries, newest first.
    ///
    /// Entries that do not decode as a [`CacheRecord`] are skipped with a warning.
    pub async fn history(&self, limit: usize) -> Result<Vec<(String, CacheRecord)>> {
        let entries = self.store.list(HISTORY_COLLECTION, limit).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(id, doc)| match CacheRecord::from_document(&doc) {
                Ok(record) => Some((id, record)),
                Err(e) => {
                    tracing::warn!(history_id = %id, error = %e, "skipping malformed history entry");
                    None
                }
            })
            .collect())
    }
}
