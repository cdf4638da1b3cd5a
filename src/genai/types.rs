//! Wire and request types for cached content.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A request to cache one document under a system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCacheRequest {
    pub document_uri: String,
    pub mime_type: String,
    pub system_instruction: String,
    pub display_name: String,
    pub expire_time: DateTime<Utc>,
}

impl CreateCacheRequest {
    pub fn pdf(
        document_uri: impl Into<String>,
        system_instruction: impl Into<String>,
        display_name: impl Into<String>,
        expire_time: DateTime<Utc>,
    ) -> Self {
        Self {
            document_uri: document_uri.into(),
            mime_type: PDF_MIME_TYPE.to_string(),
            system_instruction: system_instruction.into(),
            display_name: display_name.into(),
            expire_time,
        }
    }

    /// Request body for `POST .../cachedContents`.
    pub(crate) fn to_body(&self, model: &str) -> CreateCachedContentBody {
        CreateCachedContentBody {
            model: model.to_string(),
            display_name: self.display_name.clone(),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::file(&self.document_uri, &self.mime_type)],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(&self.system_instruction)],
            },
            expire_time: self.expire_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCachedContentBody {
    pub model: String,
    pub display_name: String,
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub expire_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_data: None,
        }
    }

    pub fn file(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                file_uri: uri.into(),
                mime_type: mime_type.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

/// The cached content resource as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedContent {
    /// Full resource name, `projects/{p}/locations/{r}/cachedContents/{id}`.
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub total_token_count: i64,
    #[serde(default)]
    pub text_count: i64,
    #[serde(default)]
    pub image_count: i64,
    #[serde(default)]
    pub video_duration_seconds: i64,
    #[serde(default)]
    pub audio_duration_seconds: i64,
}
