//! 访问令牌来源：静态令牌、系统钥匙串或元数据服务器。
//!
//! Bearer-token sources for Google APIs.
//!
//! Resolution order used by [`resolve_token_source`]:
//! 1. OS keyring entry `context-cache-refresh` / `access-token` (local runs)
//! 2. `GOOGLE_OAUTH_ACCESS_TOKEN` environment variable
//! 3. The compute metadata server (Cloud Run / Cloud Functions runtime)

use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use keyring::Entry;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

const KEYRING_SERVICE: &str = "context-cache-refresh";
const KEYRING_USER: &str = "access-token";
const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// A fixed token, e.g. from `gcloud auth print-access-token`.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Fetches service-account tokens from the metadata server and caches them until near expiry.
pub struct MetadataServerToken {
    client: reqwest::Client,
    endpoint: String,
    cached: ArcSwapOption<CachedToken>,
}

impl MetadataServerToken {
    pub fn new(client: reqwest::Client) -> Self {
        let host = std::env::var(METADATA_HOST_ENV)
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        Self::with_endpoint(client, format!("http://{}{}", host, METADATA_TOKEN_PATH))
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            cached: ArcSwapOption::empty(),
        }
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                Error::auth_with_context(
                    format!("metadata server unreachable: {}", e),
                    ErrorContext::new().with_source("metadata_server"),
                )
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth_with_context(
                format!("metadata server returned HTTP {}", status.as_u16()),
                ErrorContext::new()
                    .with_details(body)
                    .with_source("metadata_server"),
            ));
        }
        let parsed: MetadataTokenResponse = response.json().await.map_err(|e| {
            Error::auth_with_context(
                format!("unexpected token response: {}", e),
                ErrorContext::new().with_source("metadata_server"),
            )
        })?;
        let lifetime = Duration::from_secs(parsed.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            value: parsed.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn token(&self) -> Result<String> {
        if let Some(cached) = self.cached.load_full() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }
        let fresh = Arc::new(self.fetch().await?);
        let value = fresh.value.clone();
        self.cached.store(Some(fresh));
        tracing::debug!("refreshed access token from metadata server");
        Ok(value)
    }
    fn name(&self) -> &'static str {
        "metadata_server"
    }
}

/// Pick the first available token source.
pub fn resolve_token_source(client: reqwest::Client) -> Arc<dyn TokenSource> {
    if let Ok(entry) = Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        if let Ok(token) = entry.get_password() {
            tracing::info!("using access token from OS keyring");
            return Arc::new(StaticToken::new(token));
        }
    }
    if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()) {
        tracing::info!("using access token from {}", TOKEN_ENV);
        return Arc::new(StaticToken::new(token.trim()));
    }
    Arc::new(MetadataServerToken::new(client))
}
