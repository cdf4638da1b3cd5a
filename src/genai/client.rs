use super::types::{CachedContent, CreateCacheRequest};
use crate::config::Config;
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Method;

/// Create and delete cached contexts on the generative-AI service.
#[async_trait]
pub trait ContextCacheService: Send + Sync {
    async fn create(&self, request: &CreateCacheRequest) -> Result<CachedContent>;
    async fn delete(&self, cache_id: &str) -> Result<()>;
}

/// Vertex AI `cachedContents` client.
pub struct VertexCacheClient {
    transport: HttpTransport,
    endpoint: String,
    parent: String,
    model: String,
}

impl VertexCacheClient {
    pub fn new(config: &Config, transport: HttpTransport) -> Self {
        Self {
            transport,
            endpoint: config.vertex_endpoint(),
            parent: format!("projects/{}/locations/{}", config.project, config.region),
            model: config.model_resource(),
        }
    }

    /// Model resource name sent with create requests.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn collection_url(&self) -> String {
        format!("{}/v1/{}/cachedContents", self.endpoint, self.parent)
    }

    fn resource_url(&self, cache_id: &str) -> String {
        if cache_id.starts_with("projects/") {
            format!("{}/v1/{}", self.endpoint, cache_id)
        } else {
            format!("{}/{}", self.collection_url(), cache_id)
        }
    }
}

#[async_trait]
impl ContextCacheService for VertexCacheClient {
    async fn create(&self, request: &CreateCacheRequest) -> Result<CachedContent> {
        let body = serde_json::to_value(request.to_body(&self.model))?;
        let response = self
            .transport
            .execute(Method::POST, &self.collection_url(), Some(&body), &[])
            .await?;
        let json = HttpTransport::read_json(response, "vertex_cache").await?;
        let cached: CachedContent = serde_json::from_value(json).map_err(|e| {
            Error::decode_with_context(
                format!("unexpected cachedContents response: {}", e),
                ErrorContext::new().with_source("vertex_cache"),
            )
        })?;
        if cached.name.is_empty() {
            return Err(Error::decode_with_context(
                "cachedContents response has no resource name",
                ErrorContext::new()
                    .with_field_path("name")
                    .with_source("vertex_cache"),
            ));
        }
        Ok(cached)
    }

    async fn delete(&self, cache_id: &str) -> Result<()> {
        if cache_id.trim().is_empty() {
            return Err(Error::validation_with_context(
                "cache id must not be empty",
                ErrorContext::new().with_source("vertex_cache"),
            ));
        }
        let response = self
            .transport
            .execute(Method::DELETE, &self.resource_url(cache_id), None, &[])
            .await?;
        HttpTransport::read_json(response, "vertex_cache").await?;
        Ok(())
    }
}
