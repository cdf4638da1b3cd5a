//! Read-only inspection of the records written by the refresh handler.
//!
//! Backs the `verify-cache` binary; output goes to any [`Write`] so the
//! commands can be exercised against an in-memory store.

use crate::record::CacheRecord;
use crate::store::{document_to_json, CacheRepository, Document, DocumentPath, DocumentStore};
use crate::Result;
use std::io::Write;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// The latest pointer document.
    Latest,
    /// The most recent history entries.
    History { limit: usize },
    /// Any document, e.g. the legacy `config/chatbot_settings` pointer.
    Get { collection: String, document: String },
}

/// Run one inspection. Returns `false` when there was nothing to show.
pub async fn run(
    store: Arc<dyn DocumentStore>,
    inspection: &Inspection,
    out: &mut dyn Write,
) -> Result<bool> {
    match inspection {
        Inspection::Latest => {
            let Some(doc) = print_document(store.as_ref(), &CacheRepository::latest_path(), out).await?
            else {
                return Ok(false);
            };
            match CacheRecord::from_document(&doc) {
                Ok(record) => writeln!(
                    out,
                    "Active cache: {} (expires {})",
                    record.cache_id,
                    record
                        .expire_time
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string())
                )?,
                Err(e) => writeln!(out, "Warning: latest document is not a valid cache record: {}", e)?,
            }
            Ok(true)
        }
        Inspection::History { limit } => {
            let history = CacheRepository::new(store).history(*limit).await?;
            if history.is_empty() {
                writeln!(out, "No historical records found.")?;
                return Ok(false);
            }
            for (id, record) in history {
                writeln!(
                    out,
                    "{}  {}  tokens={}  updated={}",
                    id,
                    record.cache_id,
                    record.usage.total_token_count,
                    record.last_updated.to_rfc3339()
                )?;
            }
            Ok(true)
        }
        Inspection::Get {
            collection,
            document,
        } => {
            let path = DocumentPath::new(collection.clone(), document.clone());
            Ok(print_document(store.as_ref(), &path, out).await?.is_some())
        }
    }
}

async fn print_document(
    store: &dyn DocumentStore,
    path: &DocumentPath,
    out: &mut dyn Write,
) -> Result<Option<Document>> {
    let found = store.get(path).await?;
    match &found {
        Some(doc) => {
            writeln!(out, "Successfully retrieved document. Content:")?;
            writeln!(out, "{}", serde_json::to_string_pretty(&document_to_json(doc))?)?;
        }
        None => writeln!(out, "Document not found.")?,
    }
    Ok(found)
}
