use super::{Document, DocumentPath, DocumentStore};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// In-process document store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn poisoned() -> Error {
        Error::runtime_with_context(
            "MemoryStore lock poisoned",
            ErrorContext::new().with_source("memory_store"),
        )
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .cloned())
    }

    async fn set(&self, path: &DocumentPath, document: &Document) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        collections
            .entry(path.collection.clone())
            .or_default()
            .insert(path.id.clone(), document.clone());
        Ok(())
    }

    async fn list(&self, collection: &str, limit: usize) -> Result<Vec<(String, Document)>> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .rev()
                    .take(limit)
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
