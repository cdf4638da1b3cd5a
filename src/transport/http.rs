use crate::auth::TokenSource;
use crate::{Error, ErrorContext, Result};
use reqwest::{Method, Proxy};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// A reqwest client plus bearer-token injection, shared by every outbound API client.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl HttpTransport {
    /// Build the shared reqwest client with env-overridable defaults.
    pub fn build_client() -> Result<reqwest::Client> {
        let timeout_secs = env::var("CACHE_REFRESH_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(
                env::var("CACHE_REFRESH_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("CACHE_REFRESH_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))
    }

    pub fn new(client: reqwest::Client, tokens: Option<Arc<dyn TokenSource>>) -> Self {
        Self { client, tokens }
    }

    /// Transport without authentication (emulators, mock servers).
    pub fn unauthenticated(client: reqwest::Client) -> Self {
        Self::new(client, None)
    }

    /// Same client, different credentials.
    pub fn with_tokens(&self, tokens: Option<Arc<dyn TokenSource>>) -> Self {
        Self::new(self.client.clone(), tokens)
    }

    /// Send a request, attaching the bearer token and an optional JSON body.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let mut request = self.client.request(method, url);
        if let Some(tokens) = &self.tokens {
            request = request.bearer_auth(tokens.token().await?);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// Decode a JSON response, turning non-2xx statuses into [`Error::Remote`].
    pub async fn read_json(response: reqwest::Response, source: &str) -> Result<serde_json::Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        if !status.is_success() {
            return Err(Error::remote(status.as_u16(), remote_message(&body)));
        }
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_json::from_str(&body).map_err(|e| {
            Error::decode_with_context(
                format!("response is not valid JSON: {}", e),
                ErrorContext::new().with_source(source),
            )
        })
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the raw text.
fn remote_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
