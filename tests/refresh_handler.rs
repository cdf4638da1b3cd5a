//! End-to-end behaviour of the refresh sequence against in-memory backends.

mod support;

use chrono::{Duration, TimeZone, Utc};
use context_cache_refresh::store::{
    CacheRepository, DocumentStore, FieldValue, MemoryStore, HISTORY_COLLECTION,
};
use context_cache_refresh::{
    CacheRefreshHandler, CleanupStatus, Config, Error, RefreshOutcome, StorageEvent,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use support::{fixed_clock, instruction_file, FailingWrites, FakeCacheService, INSTRUCTION};

fn config(instruction: &std::path::Path) -> Config {
    Config::new("faq", "us-central1", "gemini-2.0-flash-001", "travel-insurance-faq")
        .with_instruction_path(instruction)
}

fn upload() -> StorageEvent {
    StorageEvent::new("faq-uploads", "travel_faq.pdf")
}

#[tokio::test]
async fn test_non_matching_object_is_ignored() {
    let file = instruction_file();
    let caches = FakeCacheService::new();
    let store = MemoryStore::new();
    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store.clone()));

    for name in ["travel_faq.docx", "other.pdf", "archive/travel_faq.pdf", ""] {
        let outcome = handler
            .handle(&StorageEvent::new("faq-uploads", name))
            .await
            .unwrap();
        assert!(matches!(outcome, RefreshOutcome::Ignored { .. }), "{name}");
    }

    assert_eq!(caches.create_calls(), 0);
    assert!(caches.deleted_ids().is_empty());
    assert_eq!(store.len(HISTORY_COLLECTION), 0);
    assert!(store.get(&CacheRepository::latest_path()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_refresh_writes_history_and_latest() {
    let file = instruction_file();
    let (now, clock) = fixed_clock();
    let caches = FakeCacheService::new();
    let store = MemoryStore::new();
    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store.clone()))
        .with_clock(clock);

    let outcome = handler.handle(&upload()).await.unwrap();
    let RefreshOutcome::Refreshed(report) = outcome else {
        panic!("expected a refresh");
    };

    assert_eq!(report.history_id, "context_cache_20250601123045");
    assert_eq!(report.previous_cache_id, None);
    assert!(matches!(report.cleanup, CleanupStatus::NothingToDelete));
    assert!(caches.deleted_ids().is_empty());

    let request = caches.created.lock().unwrap()[0].clone();
    assert_eq!(request.document_uri, "gs://faq-uploads/travel_faq.pdf");
    assert_eq!(request.mime_type, "application/pdf");
    assert_eq!(request.system_instruction, INSTRUCTION);
    assert_eq!(request.display_name, "travel-insurance-faq-cache");
    assert_eq!(request.expire_time, now + Duration::days(3650));

    assert_eq!(store.len(HISTORY_COLLECTION), 1);
    let repository = handler.repository();
    let latest = repository.latest().await.unwrap().unwrap();
    assert_eq!(latest, report.record);
    assert_eq!(latest.cache_id, "projects/123/locations/us-central1/cachedContents/1");
    assert_eq!(latest.gcs_uri, "gs://faq-uploads/travel_faq.pdf");
    assert_eq!(latest.last_updated, now);
    assert_eq!(latest.usage.total_token_count, 40_001);

    let history = repository.history(10).await.unwrap();
    assert_eq!(history[0].0, report.history_id);
    assert_eq!(history[0].1, latest);
}

#[tokio::test]
async fn test_second_refresh_replaces_latest_and_deletes_previous() {
    let file = instruction_file();
    let caches = FakeCacheService::new();
    let store = MemoryStore::new();

    let first = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    let second = first + Duration::hours(2);
    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store.clone()));

    let handler = handler.with_clock(Arc::new(move || first));
    handler.handle(&upload()).await.unwrap();
    let handler = handler.with_clock(Arc::new(move || second));
    let outcome = handler.handle(&upload()).await.unwrap();

    let RefreshOutcome::Refreshed(report) = outcome else {
        panic!("expected a refresh");
    };
    let old_id = "projects/123/locations/us-central1/cachedContents/1";
    assert_eq!(report.previous_cache_id.as_deref(), Some(old_id));
    assert!(matches!(
        &report.cleanup,
        CleanupStatus::Deleted { cache_id } if cache_id == old_id
    ));
    assert_eq!(caches.deleted_ids(), vec![old_id.to_string()]);

    assert_eq!(store.len(HISTORY_COLLECTION), 2);
    let repository = handler.repository();
    assert_eq!(
        repository.active_cache_id().await.unwrap().as_deref(),
        Some("projects/123/locations/us-central1/cachedContents/2")
    );
    let history = repository.history(10).await.unwrap();
    assert_eq!(history[0].0, "context_cache_20250601110000");
    assert_eq!(history[1].0, "context_cache_20250601090000");
    assert_eq!(history[1].1.cache_id, old_id);
}

#[tokio::test]
async fn test_create_failure_leaves_records_untouched() {
    let file = instruction_file();
    let caches = FakeCacheService::new();
    let store = MemoryStore::new();
    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store.clone()));

    handler.handle(&upload()).await.unwrap();
    let before = store.get(&CacheRepository::latest_path()).await.unwrap();

    caches.fail_create.store(true, Ordering::SeqCst);
    let outcome = handler.handle(&upload()).await.unwrap();
    match outcome {
        RefreshOutcome::Aborted { error } => assert_eq!(error.status(), Some(400)),
        other => panic!("expected abort, got {:?}", other),
    }

    assert_eq!(caches.create_calls(), 2);
    assert!(caches.deleted_ids().is_empty());
    assert_eq!(store.len(HISTORY_COLLECTION), 1);
    assert_eq!(store.get(&CacheRepository::latest_path()).await.unwrap(), before);
}

#[tokio::test]
async fn test_delete_failure_keeps_new_cache_active() {
    let file = instruction_file();
    let caches = FakeCacheService::new();
    let store = MemoryStore::new();
    let first = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store.clone()))
        .with_clock(Arc::new(move || first));
    handler.handle(&upload()).await.unwrap();

    caches.fail_delete.store(true, Ordering::SeqCst);
    let later = first + Duration::minutes(5);
    let handler = handler.with_clock(Arc::new(move || later));
    let outcome = handler.handle(&upload()).await.unwrap();

    let RefreshOutcome::Refreshed(report) = outcome else {
        panic!("expected a refresh");
    };
    match &report.cleanup {
        CleanupStatus::Failed { cache_id, error } => {
            assert_eq!(cache_id, "projects/123/locations/us-central1/cachedContents/1");
            assert!(error.is_retryable());
        }
        other => panic!("expected failed cleanup, got {:?}", other),
    }
    assert_eq!(
        handler.repository().active_cache_id().await.unwrap().as_deref(),
        Some("projects/123/locations/us-central1/cachedContents/2")
    );
    assert_eq!(store.len(HISTORY_COLLECTION), 2);
}

#[tokio::test]
async fn test_refreshes_in_same_second_share_history_id() {
    let file = instruction_file();
    let (_, clock) = fixed_clock();
    let caches = FakeCacheService::new();
    let store = MemoryStore::new();
    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store.clone()))
        .with_clock(clock);

    handler.handle(&upload()).await.unwrap();
    handler.handle(&upload()).await.unwrap();

    assert_eq!(store.len(HISTORY_COLLECTION), 1);
    let history = handler.repository().history(10).await.unwrap();
    assert_eq!(
        history[0].1.cache_id,
        "projects/123/locations/us-central1/cachedContents/2"
    );
    assert_eq!(caches.deleted_ids().len(), 1);
}

#[tokio::test]
async fn test_latest_without_string_cache_id_skips_delete() {
    let file = instruction_file();
    let caches = FakeCacheService::new();
    let store = MemoryStore::new();
    let mut legacy = context_cache_refresh::store::Document::new();
    legacy.insert("cache_id".into(), FieldValue::Null);
    store.set(&CacheRepository::latest_path(), &legacy).await.unwrap();

    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store.clone()));
    let outcome = handler.handle(&upload()).await.unwrap();

    let RefreshOutcome::Refreshed(report) = outcome else {
        panic!("expected a refresh");
    };
    assert_eq!(report.previous_cache_id, None);
    assert!(caches.deleted_ids().is_empty());
}

#[tokio::test]
async fn test_store_write_failure_is_an_error() {
    let file = instruction_file();
    let caches = FakeCacheService::new();
    let store = FailingWrites {
        inner: MemoryStore::new(),
        collection: "context_cache".to_string(),
    };
    let inner = store.inner.clone();
    let handler = CacheRefreshHandler::new(config(file.path()), caches.clone(), Arc::new(store));

    let err = handler.handle(&upload()).await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 500, .. }));
    assert_eq!(caches.create_calls(), 1);
    assert!(caches.deleted_ids().is_empty());
    // history is written before the pointer
    assert_eq!(inner.len(HISTORY_COLLECTION), 1);
}

#[tokio::test]
async fn test_ttl_overflow_is_an_error_not_a_panic() {
    let file = instruction_file();
    let caches = FakeCacheService::new();
    let mut config = config(file.path());
    config.ttl_days = 100_000_000;
    let handler = CacheRefreshHandler::new(config, caches.clone(), Arc::new(MemoryStore::new()));

    let err = handler.handle(&upload()).await.unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(
        err.context().and_then(|c| c.field_path.as_deref()),
        Some("CACHE_TTL_DAYS")
    );
    assert_eq!(caches.create_calls(), 0);
}

#[tokio::test]
async fn test_missing_instruction_file_fails_before_create() {
    let dir = tempfile::tempdir().unwrap();
    let caches = FakeCacheService::new();
    let handler = CacheRefreshHandler::new(
        config(&dir.path().join("missing.txt")),
        caches.clone(),
        Arc::new(MemoryStore::new()),
    );

    let err = handler.handle(&upload()).await.unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(
        err.context().and_then(|c| c.field_path.as_deref()),
        Some("SYSTEM_INSTRUCTION_PATH")
    );
    assert_eq!(caches.create_calls(), 0);
}
