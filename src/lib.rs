//! # context-cache-refresh
//!
//! 在 FAQ 文档上传后刷新 Vertex AI 上下文缓存，并在 Firestore 中记录缓存元数据。
//!
//! Refreshes a Vertex AI context cache whenever the tracked FAQ document is
//! uploaded to Cloud Storage, and keeps the active cache id in Firestore.
//!
//! ## Overview
//!
//! A storage "object finalized" event arrives as a CloudEvent. If the object
//! name matches the tracked document, the handler creates a new cached context
//! from it, writes a history record plus the `latest` pointer, and deletes the
//! cache that was active before. Creation failure leaves everything as it was;
//! deletion failure only leaves an orphaned cache behind.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use context_cache_refresh::auth::resolve_token_source;
//! use context_cache_refresh::genai::VertexCacheClient;
//! use context_cache_refresh::store::FirestoreStore;
//! use context_cache_refresh::transport::HttpTransport;
//! use context_cache_refresh::{CacheRefreshHandler, Config, StorageEvent};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> context_cache_refresh::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = HttpTransport::build_client()?;
//!     let transport = HttpTransport::new(client.clone(), Some(resolve_token_source(client)));
//!
//!     let caches = Arc::new(VertexCacheClient::new(&config, transport.clone()));
//!     let store = Arc::new(FirestoreStore::new(&config, transport)?);
//!     let handler = CacheRefreshHandler::new(config, caches, store);
//!
//!     let outcome = handler
//!         .handle(&StorageEvent::new("faq-uploads", "travel_faq.pdf"))
//!         .await?;
//!     println!("{}", outcome.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Environment configuration |
//! | [`event`] | Storage event parsing and the document filter |
//! | [`handler`] | The refresh sequence |
//! | [`genai`] | Context cache service client |
//! | [`store`] | Document store backends and latest/history bookkeeping |
//! | [`record`] | The cache metadata record |
//! | [`inspect`] | Read-back of stored records |
//! | [`auth`] | Bearer token sources |
//! | [`transport`] | Shared HTTP client |
//! | [`server`] | CloudEvent HTTP endpoint |
//! | [`logging`] | Tracing subscriber setup |

pub mod auth;
pub mod config;
pub mod event;
pub mod genai;
pub mod handler;
pub mod inspect;
pub mod logging;
pub mod record;
pub mod server;
pub mod store;
pub mod transport;

pub use config::Config;
pub use event::{DocumentFilter, StorageEvent};
pub use handler::{CacheRefreshHandler, CleanupStatus, RefreshOutcome, RefreshReport};
pub use record::{CacheRecord, CacheUsage};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
