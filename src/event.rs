//! Storage trigger payloads.
//!
//! The storage service delivers "object finalized" notifications as CloudEvents.
//! In binary content mode the HTTP body is the object resource itself and the
//! envelope lives in `ce-*` headers; in structured mode the body is the full
//! envelope with the object under `data`. Both reduce to a [`StorageEvent`].

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// The part of a storage object notification the handler acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    pub bucket: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Object generation; the storage API encodes int64 values as strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            content_type: None,
            generation: None,
            size: None,
        }
    }

    /// `gs://` URI of the uploaded object.
    pub fn document_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    /// Parse an event from an HTTP request body.
    ///
    /// Accepts a structured CloudEvent envelope, or a bare object resource as
    /// sent in binary content mode.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            Error::validation_with_context(
                "event body is not valid JSON",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("event"),
            )
        })?;
        let (data, field_prefix) = match value.get("data") {
            Some(data) if value.get("specversion").is_some() => (data.clone(), "data."),
            _ => (value, ""),
        };
        let event: StorageEvent = serde_json::from_value(data).map_err(|e| {
            Error::validation_with_context(
                "event payload is not a storage object",
                ErrorContext::new()
                    .with_field_path(format!("{}bucket/{}name", field_prefix, field_prefix))
                    .with_details(e.to_string())
                    .with_source("event"),
            )
        })?;
        event.validate(field_prefix)?;
        Ok(event)
    }

    fn validate(&self, field_prefix: &str) -> Result<()> {
        for (field, value) in [("bucket", &self.bucket), ("name", &self.name)] {
            if value.trim().is_empty() {
                return Err(Error::validation_with_context(
                    format!("storage event has an empty {}", field),
                    ErrorContext::new()
                        .with_field_path(format!("{}{}", field_prefix, field))
                        .with_source("event"),
                ));
            }
        }
        Ok(())
    }
}

/// Naming convention of the tracked document: a prefix and suffix match on the object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    prefix: String,
    suffix: String,
}

impl DocumentFilter {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn matches(&self, object_name: &str) -> bool {
        object_name.starts_with(&self.prefix) && object_name.ends_with(&self.suffix)
    }
}
