//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use context_cache_refresh::genai::{CachedContent, ContextCacheService, CreateCacheRequest, UsageMetadata};
use context_cache_refresh::handler::Clock;
use context_cache_refresh::store::{Document, DocumentPath, DocumentStore, MemoryStore};
use context_cache_refresh::{Error, Result};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const INSTRUCTION: &str = "You are a travel insurance assistant. Answer only from the FAQ.";

pub fn fixed_clock() -> (DateTime<Utc>, Clock) {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap();
    (now, Arc::new(move || now))
}

pub fn instruction_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(INSTRUCTION.as_bytes()).expect("write instruction");
    file
}

/// In-memory stand-in for the context cache service.
#[derive(Default)]
pub struct FakeCacheService {
    pub created: Mutex<Vec<CreateCacheRequest>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    counter: AtomicUsize,
}

impl FakeCacheService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn create_calls(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextCacheService for FakeCacheService {
    async fn create(&self, request: &CreateCacheRequest) -> Result<CachedContent> {
        self.created.lock().unwrap().push(request.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::remote(400, "Cached content is too small"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CachedContent {
            name: format!("projects/123/locations/us-central1/cachedContents/{}", n),
            model: "projects/faq/locations/us-central1/publishers/google/models/gemini-2.0-flash-001"
                .to_string(),
            display_name: Some(request.display_name.clone()),
            create_time: Some(request.expire_time),
            update_time: Some(request.expire_time),
            expire_time: Some(request.expire_time),
            usage_metadata: Some(UsageMetadata {
                total_token_count: 40_000 + n as i64,
                text_count: 150_000,
                image_count: 4,
                ..Default::default()
            }),
        })
    }

    async fn delete(&self, cache_id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(cache_id.to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::remote(503, "backend unavailable"));
        }
        Ok(())
    }
}

/// Memory store whose writes to one collection fail.
pub struct FailingWrites {
    pub inner: MemoryStore,
    pub collection: String,
}

#[async_trait]
impl DocumentStore for FailingWrites {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocumentPath, document: &Document) -> Result<()> {
        if path.collection == self.collection {
            return Err(Error::remote(500, "write failed"));
        }
        self.inner.set(path, document).await
    }

    async fn list(&self, collection: &str, limit: usize) -> Result<Vec<(String, Document)>> {
        self.inner.list(collection, limit).await
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
