//! The metadata record written for every refresh.

use crate::genai::CachedContent;
use crate::store::{Document, FieldValue};
use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Utc};

const HISTORY_ID_FORMAT: &str = "context_cache_%Y%m%d%H%M%S";

/// Token accounting reported by the AI service for a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub total_token_count: i64,
    pub text_count: i64,
    pub image_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub cache_id: String,
    pub model: String,
    pub display_name: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub expire_time: Option<DateTime<Utc>>,
    /// Source document, `gs://bucket/object`.
    pub gcs_uri: String,
    pub system_instruction: String,
    pub usage: CacheUsage,
    pub last_updated: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(
        cached: &CachedContent,
        gcs_uri: impl Into<String>,
        system_instruction: impl Into<String>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let usage = cached
            .usage_metadata
            .as_ref()
            .map(|u| CacheUsage {
                total_token_count: u.total_token_count,
                text_count: u.text_count,
                image_count: u.image_count,
            })
            .unwrap_or_default();
        Self {
            cache_id: cached.name.clone(),
            model: cached.model.clone(),
            display_name: cached.display_name.clone(),
            create_time: cached.create_time,
            update_time: cached.update_time,
            expire_time: cached.expire_time,
            gcs_uri: gcs_uri.into(),
            system_instruction: system_instruction.into(),
            usage,
            last_updated,
        }
    }

    pub fn to_document(&self) -> Document {
        let mut usage = Document::new();
        usage.insert("total_token_count".into(), self.usage.total_token_count.into());
        usage.insert("text_count".into(), self.usage.text_count.into());
        usage.insert("image_count".into(), self.usage.image_count.into());

        let mut doc = Document::new();
        doc.insert("cache_id".into(), self.cache_id.clone().into());
        doc.insert("model".into(), self.model.clone().into());
        doc.insert("display_name".into(), self.display_name.clone().into());
        doc.insert("create_time".into(), self.create_time.into());
        doc.insert("update_time".into(), self.update_time.into());
        doc.insert("expire_time".into(), self.expire_time.into());
        doc.insert("gcs_uri".into(), self.gcs_uri.clone().into());
        doc.insert("system_instruction".into(), self.system_instruction.clone().into());
        doc.insert("usage_metadata".into(), FieldValue::Map(usage));
        doc.insert("last_updated".into(), self.last_updated.into());
        doc
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        let usage = match doc.get("usage_metadata") {
            Some(FieldValue::Map(m)) => CacheUsage {
                total_token_count: optional_int(m, "total_token_count"),
                text_count: optional_int(m, "text_count"),
                image_count: optional_int(m, "image_count"),
            },
            _ => CacheUsage::default(),
        };
        Ok(Self {
            cache_id: required_str(doc, "cache_id")?,
            model: optional_str(doc, "model").unwrap_or_default(),
            display_name: optional_str(doc, "display_name"),
            create_time: doc.get("create_time").and_then(FieldValue::as_timestamp),
            update_time: doc.get("update_time").and_then(FieldValue::as_timestamp),
            expire_time: doc.get("expire_time").and_then(FieldValue::as_timestamp),
            gcs_uri: optional_str(doc, "gcs_uri").unwrap_or_default(),
            system_instruction: optional_str(doc, "system_instruction").unwrap_or_default(),
            usage,
            last_updated: doc
                .get("last_updated")
                .and_then(FieldValue::as_timestamp)
                .ok_or_else(|| missing("last_updated"))?,
        })
    }
}

/// History document id for a refresh at `now`; second granularity.
pub fn history_id(now: DateTime<Utc>) -> String {
    now.format(HISTORY_ID_FORMAT).to_string()
}

fn optional_str(doc: &Document, key: &str) -> Option<String> {
    doc.get(key).and_then(FieldValue::as_str).map(str::to_string)
}

fn required_str(doc: &Document, key: &str) -> Result<String> {
    optional_str(doc, key).ok_or_else(|| missing(key))
}

fn optional_int(doc: &Document, key: &str) -> i64 {
    doc.get(key).and_then(FieldValue::as_i64).unwrap_or(0)
}

fn missing(key: &str) -> Error {
    Error::decode_with_context(
        "cache record field missing or of the wrong type",
        ErrorContext::new()
            .with_field_path(key)
            .with_source("cache_record"),
    )
}
