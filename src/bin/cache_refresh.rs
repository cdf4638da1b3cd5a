//! cache-refresh: CloudEvent endpoint that refreshes the FAQ context cache.
//!
//! Reads configuration from the environment (plus `.env`, if present) once,
//! builds the Vertex AI and Firestore clients, and serves storage events on
//! `$PORT` until SIGTERM.

use anyhow::Context;
use context_cache_refresh::auth::resolve_token_source;
use context_cache_refresh::genai::VertexCacheClient;
use context_cache_refresh::store::FirestoreStore;
use context_cache_refresh::transport::HttpTransport;
use context_cache_refresh::{config, logging, server, CacheRefreshHandler, Config};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    logging::init();

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(
        project = %config.project,
        region = %config.region,
        model = %config.model_name,
        database = %config.database,
        "starting cache-refresh"
    );

    let client = HttpTransport::build_client().context("building HTTP client")?;
    let tokens = resolve_token_source(client.clone());
    tracing::info!(source = tokens.name(), "resolved access token source");
    let transport = HttpTransport::new(client, Some(tokens));

    let caches = Arc::new(VertexCacheClient::new(&config, transport.clone()));
    let store = Arc::new(
        FirestoreStore::connect(&config, transport).context("configuring Firestore client")?,
    );

    let port = config.port;
    let handler = Arc::new(CacheRefreshHandler::new(config, caches, store));
    server::serve(handler, port).await.context("serving storage events")?;
    Ok(())
}
