//! 缓存刷新处理器：过滤事件、创建新缓存、记录元数据并清理旧缓存。
//!
//! The refresh handler.
//!
//! For a matching upload the sequence is:
//! 1. read the active cache id from the latest pointer
//! 2. read the system instruction file
//! 3. create the new cached context (failure aborts with nothing written)
//! 4. write the history entry, then overwrite the latest pointer
//! 5. delete the previous cache; failure is reported, never fatal

use crate::config::Config;
use crate::event::StorageEvent;
use crate::genai::{ContextCacheService, CreateCacheRequest};
use crate::record::{history_id, CacheRecord};
use crate::store::{CacheRepository, DocumentStore};
use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::Arc;

/// Source of "now"; swapped out in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What happened to the previous cache after a successful refresh.
#[derive(Debug)]
pub enum CleanupStatus {
    /// There was no previous cache, or it is the one just created.
    NothingToDelete,
    Deleted { cache_id: String },
    /// The old cache is still live and may need manual cleanup.
    Failed { cache_id: String, error: Error },
}

#[derive(Debug)]
pub struct RefreshReport {
    pub record: CacheRecord,
    pub history_id: String,
    pub previous_cache_id: Option<String>,
    pub cleanup: CleanupStatus,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    /// The object is not the tracked document.
    Ignored { object: String },
    /// Cache creation failed; the previous cache stays active and nothing was written.
    Aborted { error: Error },
    Refreshed(RefreshReport),
}

impl RefreshOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RefreshOutcome::Ignored { .. } => "ignored",
            RefreshOutcome::Aborted { .. } => "aborted",
            RefreshOutcome::Refreshed(_) => "refreshed",
        }
    }
}

pub struct CacheRefreshHandler {
    config: Config,
    caches: Arc<dyn ContextCacheService>,
    repository: CacheRepository,
    clock: Clock,
}

impl CacheRefreshHandler {
    pub fn new(
        config: Config,
        caches: Arc<dyn ContextCacheService>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            caches,
            repository: CacheRepository::new(store),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &CacheRepository {
        &self.repository
    }

    /// Process one storage event.
    ///
    /// `Err` means a fault after the new cache was created or before anything was
    /// attempted (store unreachable, instruction file missing); cache creation
    /// failures are reported as [`RefreshOutcome::Aborted`].
    #[tracing::instrument(skip(self, event), fields(bucket = %event.bucket, object = %event.name))]
    pub async fn handle(&self, event: &StorageEvent) -> Result<RefreshOutcome> {
        if !self.config.filter.matches(&event.name) {
            tracing::info!("ignoring object: not the tracked FAQ document");
            return Ok(RefreshOutcome::Ignored {
                object: event.name.clone(),
            });
        }

        let previous_cache_id = self.repository.active_cache_id().await?;
        let system_instruction = load_instruction(&self.config.instruction_path).await?;
        let document_uri = event.document_uri();

        let expire_time = expiry((self.clock)(), self.config.ttl_days)?;
        let request = CreateCacheRequest::pdf(
            document_uri.clone(),
            system_instruction.clone(),
            self.config.display_name.clone(),
            expire_time,
        );
        let cached = match self.caches.create(&request).await {
            Ok(cached) => {
                tracing::info!(cache_id = %cached.name, "created new content cache");
                cached
            }
            Err(error) => {
                tracing::error!(
                    error = %error,
                    retryable = error.is_retryable(),
                    "failed to create new content cache; aborting update"
                );
                return Ok(RefreshOutcome::Aborted { error });
            }
        };

        let now = (self.clock)();
        let record = CacheRecord::new(&cached, document_uri, system_instruction, now);
        let history_id = history_id(now);
        self.repository.record_refresh(&history_id, &record).await?;

        let cleanup = self
            .retire_previous(previous_cache_id.as_deref(), &record.cache_id)
            .await;
        match &cleanup {
            CleanupStatus::NothingToDelete => tracing::debug!("no previous cache to delete"),
            CleanupStatus::Deleted { cache_id } => {
                tracing::info!(cache_id = %cache_id, "deleted old cache")
            }
            CleanupStatus::Failed { cache_id, error } => tracing::warn!(
                cache_id = %cache_id,
                error = %error,
                retryable = error.is_retryable(),
                "failed to delete old cache; it could need manual cleanup"
            ),
        }

        Ok(RefreshOutcome::Refreshed(RefreshReport {
            record,
            history_id,
            previous_cache_id,
            cleanup,
        }))
    }

    async fn retire_previous(&self, previous: Option<&str>, current: &str) -> CleanupStatus {
        let Some(previous) = previous.filter(|id| *id != current) else {
            return CleanupStatus::NothingToDelete;
        };
        match self.caches.delete(previous).await {
            Ok(()) => CleanupStatus::Deleted {
                cache_id: previous.to_string(),
            },
            Err(error) => CleanupStatus::Failed {
                cache_id: previous.to_string(),
                error,
            },
        }
    }
}

/// `now` plus the cache TTL, or a configuration error when it leaves chrono's date range.
fn expiry(now: DateTime<Utc>, ttl_days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(ttl_days)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            Error::configuration_with_context(
                "cache TTL overflows the expiry timestamp",
                ErrorContext::new()
                    .with_field_path("CACHE_TTL_DAYS")
                    .with_details(ttl_days.to_string())
                    .with_source("handler"),
            )
        })
}

/// Read the system instruction; done on every invocation so edits apply without a restart.
async fn load_instruction(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::configuration_with_context(
            format!("cannot read system instruction: {}", e),
            ErrorContext::new()
                .with_field_path("SYSTEM_INSTRUCTION_PATH")
                .with_details(path.display().to_string())
                .with_source("handler"),
        )
    })
}
