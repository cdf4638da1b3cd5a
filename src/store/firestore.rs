//! Firestore REST backend.
//!
//! Uses `projects/{p}/databases/{db}/documents/{collection}/{id}` with `GET` for
//! reads and `PATCH` without an update mask for writes, which replaces the whole
//! document (create-or-overwrite).

use super::value::{decode_document, encode_document};
use super::{Document, DocumentPath, DocumentStore};
use crate::auth::StaticToken;
use crate::config::Config;
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use url::Url;

const EMULATOR_ADMIN_TOKEN: &str = "owner";

pub struct FirestoreStore {
    transport: HttpTransport,
    documents_root: Url,
}

impl FirestoreStore {
    pub fn new(config: &Config, transport: HttpTransport) -> Result<Self> {
        let root = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            config.firestore_base_url.trim_end_matches('/'),
            config.project,
            config.database
        );
        let documents_root = Url::parse(&root).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid Firestore URL: {}", e),
                ErrorContext::new()
                    .with_field_path("FIRESTORE_BASE_URL")
                    .with_details(root.clone()),
            )
        })?;
        Ok(Self {
            transport,
            documents_root,
        })
    }

    /// Like [`FirestoreStore::new`], but talks to the emulator with its admin token when configured.
    pub fn connect(config: &Config, transport: HttpTransport) -> Result<Self> {
        let transport = if config.firestore_emulator {
            tracing::info!(base_url = %config.firestore_base_url, "using Firestore emulator");
            transport.with_tokens(Some(Arc::new(StaticToken::new(EMULATOR_ADMIN_TOKEN))))
        } else {
            transport
        };
        Self::new(config, transport)
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.documents_root.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::configuration_with_context(
                    "Firestore base URL cannot carry a path",
                    ErrorContext::new().with_field_path("FIRESTORE_BASE_URL"),
                )
            })?
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let url = self.url_for(&[path.collection.as_str(), path.id.as_str()])?;
        let response = self
            .transport
            .execute(Method::GET, url.as_str(), None, &[])
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let json = HttpTransport::read_json(response, "firestore").await?;
        decode_document(&json).map(Some)
    }

    async fn set(&self, path: &DocumentPath, document: &Document) -> Result<()> {
        let url = self.url_for(&[path.collection.as_str(), path.id.as_str()])?;
        let body = encode_document(document);
        let response = self
            .transport
            .execute(Method::PATCH, url.as_str(), Some(&body), &[])
            .await?;
        HttpTransport::read_json(response, "firestore").await?;
        Ok(())
    }

    async fn list(&self, collection: &str, limit: usize) -> Result<Vec<(String, Document)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = self.url_for(&[collection])?;
        let query = [
            ("pageSize", limit.to_string()),
            ("orderBy", "__name__ desc".to_string()),
        ];
        let response = self
            .transport
            .execute(Method::GET, url.as_str(), None, &query)
            .await?;
        let json = HttpTransport::read_json(response, "firestore").await?;
        let Some(documents) = json.get("documents").and_then(|d| d.as_array()) else {
            return Ok(Vec::new());
        };
        documents
            .iter()
            .map(|resource| {
                let id = resource
                    .get("name")
                    .and_then(|n| n.as_str())
                    .and_then(|n| n.rsplit('/').next())
                    .unwrap_or_default()
                    .to_string();
                decode_document(resource).map(|doc| (id, doc))
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}
