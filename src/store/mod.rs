//! 文档存储：可插拔后端，记录当前缓存与历史记录。
//!
//! # Document Store
//!
//! The refresh handler keeps its bookkeeping in a document database: one
//! "latest" pointer document and an append-only history collection. Access goes
//! through the [`DocumentStore`] trait so the handler can run against Firestore
//! in production and an in-memory map in tests.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`DocumentStore`] | Trait for document backends |
//! | [`FirestoreStore`] | Firestore REST backend (emulator aware) |
//! | [`MemoryStore`] | In-process backend |
//! | [`CacheRepository`] | Latest/history access on top of any backend |
//! | [`FieldValue`] | Typed document values |

mod firestore;
mod memory;
mod repository;
mod value;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use repository::{CacheRepository, HISTORY_COLLECTION, LATEST_COLLECTION, LATEST_DOCUMENT};
pub use value::{decode_document, document_to_json, encode_document, Document, FieldValue};

use crate::Result;
use async_trait::async_trait;
use std::fmt;

/// Location of a document: `{collection}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>>;
    /// Create or fully overwrite a document.
    async fn set(&self, path: &DocumentPath, document: &Document) -> Result<()>;
    /// Up to `limit` documents of a collection, highest document id first.
    async fn list(&self, collection: &str, limit: usize) -> Result<Vec<(String, Document)>>;
    fn name(&self) -> &'static str;
}
