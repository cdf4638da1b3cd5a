//! 运行配置：启动时从环境变量读取一次。
//!
//! Runtime configuration, read once at process start. The binaries first merge
//! a `.env` file into the environment with [`load_dotenv`].
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `GCP_PROJECT` | yes | |
//! | `FUNCTION_REGION` | yes | |
//! | `MODEL_NAME` | yes | |
//! | `DB_NAME` | yes | |
//! | `SYSTEM_INSTRUCTION_PATH` | no | `system_instruction.txt` |
//! | `FAQ_OBJECT_PREFIX` | no | `travel_faq` |
//! | `FAQ_OBJECT_SUFFIX` | no | `.pdf` |
//! | `CACHE_DISPLAY_NAME` | no | `travel-insurance-faq-cache` |
//! | `CACHE_TTL_DAYS` | no | `3650` |
//! | `PORT` | no | `8080` |
//! | `VERTEX_BASE_URL` | no | derived from region |
//! | `FIRESTORE_BASE_URL` | no | `https://firestore.googleapis.com` |
//! | `FIRESTORE_EMULATOR_HOST` | no | |

use crate::event::DocumentFilter;
use crate::{Error, ErrorContext, Result};
use std::path::PathBuf;

pub const DEFAULT_OBJECT_PREFIX: &str = "travel_faq";
pub const DEFAULT_OBJECT_SUFFIX: &str = ".pdf";
pub const DEFAULT_DISPLAY_NAME: &str = "travel-insurance-faq-cache";
pub const DEFAULT_INSTRUCTION_PATH: &str = "system_instruction.txt";
pub const DEFAULT_TTL_DAYS: i64 = 365 * 10;
/// Upper bound on `CACHE_TTL_DAYS`; keeps now + TTL inside the representable date range.
pub const MAX_TTL_DAYS: i64 = 365 * 1000;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// Explicit configuration passed to the handler and its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub project: String,
    pub region: String,
    pub model_name: String,
    pub database: String,
    pub instruction_path: PathBuf,
    pub filter: DocumentFilter,
    pub display_name: String,
    pub ttl_days: i64,
    pub port: u16,
    /// Overrides the regional Vertex AI endpoint (mock servers, private endpoints).
    pub vertex_base_url: Option<String>,
    pub firestore_base_url: String,
    /// Set when talking to the Firestore emulator, which takes the `owner` admin token.
    pub firestore_emulator: bool,
}

/// Load a `.env` file from the working directory or one of its parents.
///
/// Variables already present in the environment are left alone. Returns the
/// file that was read.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

impl Config {
    /// Build a configuration with defaults for everything but the four required fields.
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
        model_name: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
            model_name: model_name.into(),
            database: database.into(),
            instruction_path: PathBuf::from(DEFAULT_INSTRUCTION_PATH),
            filter: DocumentFilter::new(DEFAULT_OBJECT_PREFIX, DEFAULT_OBJECT_SUFFIX),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            ttl_days: DEFAULT_TTL_DAYS,
            port: DEFAULT_PORT,
            vertex_base_url: None,
            firestore_base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            firestore_emulator: false,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Error::configuration_with_context(
                        format!("{} must be provided", key),
                        ErrorContext::new().with_field_path(key).with_source("config"),
                    )
                })
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Config::new(
            required("GCP_PROJECT")?,
            required("FUNCTION_REGION")?,
            required("MODEL_NAME")?,
            required("DB_NAME")?,
        );

        if let Some(path) = optional("SYSTEM_INSTRUCTION_PATH") {
            config.instruction_path = PathBuf::from(path);
        }
        let prefix = optional("FAQ_OBJECT_PREFIX").unwrap_or_else(|| DEFAULT_OBJECT_PREFIX.into());
        let suffix = optional("FAQ_OBJECT_SUFFIX").unwrap_or_else(|| DEFAULT_OBJECT_SUFFIX.into());
        config.filter = DocumentFilter::new(prefix, suffix);
        if let Some(name) = optional("CACHE_DISPLAY_NAME") {
            config.display_name = name;
        }
        if let Some(days) = optional("CACHE_TTL_DAYS") {
            config.ttl_days = parse_number(&days, "CACHE_TTL_DAYS")?;
            if config.ttl_days <= 0 || config.ttl_days > MAX_TTL_DAYS {
                return Err(Error::configuration_with_context(
                    format!("cache TTL must be between 1 and {} days", MAX_TTL_DAYS),
                    ErrorContext::new()
                        .with_field_path("CACHE_TTL_DAYS")
                        .with_details(days),
                ));
            }
        }
        if let Some(port) = optional("PORT") {
            config.port = parse_number(&port, "PORT")?;
        }
        config.vertex_base_url = optional("VERTEX_BASE_URL");
        Ok(config.with_firestore_overrides(&lookup))
    }

    /// Apply `FIRESTORE_EMULATOR_HOST` or `FIRESTORE_BASE_URL`; the emulator wins.
    pub fn with_firestore_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(host) = optional("FIRESTORE_EMULATOR_HOST") {
            self.firestore_base_url = format!("http://{}", host.trim().trim_end_matches('/'));
            self.firestore_emulator = true;
        } else if let Some(url) = optional("FIRESTORE_BASE_URL") {
            self.firestore_base_url = url.trim().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_instruction_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.instruction_path = path.into();
        self
    }

    pub fn with_vertex_base_url(mut self, url: impl Into<String>) -> Self {
        self.vertex_base_url = Some(url.into());
        self
    }

    pub fn with_firestore_base_url(mut self, url: impl Into<String>) -> Self {
        self.firestore_base_url = url.into();
        self
    }

    /// Base URL of the regional Vertex AI endpoint.
    pub fn vertex_endpoint(&self) -> String {
        if let Some(url) = &self.vertex_base_url {
            return url.trim_end_matches('/').to_string();
        }
        if self.region == "global" {
            "https://aiplatform.googleapis.com".to_string()
        } else {
            format!("https://{}-aiplatform.googleapis.com", self.region)
        }
    }

    /// Fully qualified publisher model resource name.
    pub fn model_resource(&self) -> String {
        let model = self.model_name.as_str();
        if model.starts_with("projects/") {
            model.to_string()
        } else if model.starts_with("publishers/") {
            format!("projects/{}/locations/{}/{}", self.project, self.region, model)
        } else {
            let id = model.strip_prefix("models/").unwrap_or(model);
            format!(
                "projects/{}/locations/{}/publishers/google/models/{}",
                self.project, self.region, id
            )
        }
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("{} must be a number", key),
            ErrorContext::new().with_field_path(key).with_details(raw),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("GCP_PROJECT", "faq-project"),
        ("FUNCTION_REGION", "us-central1"),
        ("MODEL_NAME", "gemini-2.0-flash-001"),
        ("DB_NAME", "travel-insurance-faq"),
    ];

    #[test]
    fn test_required_fields_and_defaults() {
        let config = Config::from_lookup(lookup_from(REQUIRED)).unwrap();
        assert_eq!(config.project, "faq-project");
        assert_eq!(config.region, "us-central1");
        assert_eq!(config.model_name, "gemini-2.0-flash-001");
        assert_eq!(config.database, "travel-insurance-faq");
        assert_eq!(config.display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(config.ttl_days, 3650);
        assert_eq!(config.port, 8080);
        assert!(config.filter.matches("travel_faq_v2.pdf"));
        assert!(!config.firestore_emulator);
    }

    #[test]
    fn test_missing_required_field() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[..3])).unwrap_err();
        assert!(err.to_string().contains("DB_NAME"));
    }

    #[test]
    fn test_blank_required_field_is_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[0] = ("GCP_PROJECT", "   ");
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_optional_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("FAQ_OBJECT_PREFIX", "policy"),
            ("FAQ_OBJECT_SUFFIX", ".txt"),
            ("CACHE_TTL_DAYS", "30"),
            ("PORT", "9090"),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8081"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert!(config.filter.matches("policy.txt"));
        assert!(!config.filter.matches("travel_faq.pdf"));
        assert_eq!(config.ttl_days, 30);
        assert_eq!(config.port, 9090);
        assert_eq!(config.firestore_base_url, "http://localhost:8081");
        assert!(config.firestore_emulator);
    }

    #[test]
    fn test_invalid_numbers() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CACHE_TTL_DAYS", "ten"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CACHE_TTL_DAYS", "0"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_ttl_beyond_date_range_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CACHE_TTL_DAYS", "100000000"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("CACHE_TTL_DAYS")
        );

        let mut pairs = REQUIRED.to_vec();
        let max = MAX_TTL_DAYS.to_string();
        pairs.push(("CACHE_TTL_DAYS", max.as_str()));
        assert_eq!(Config::from_lookup(lookup_from(&pairs)).unwrap().ttl_days, MAX_TTL_DAYS);
    }

    #[test]
    fn test_vertex_endpoint_and_model_resource() {
        let config = Config::new("p", "europe-west4", "gemini-2.0-flash-001", "db");
        assert_eq!(
            config.vertex_endpoint(),
            "https://europe-west4-aiplatform.googleapis.com"
        );
        assert_eq!(
            config.model_resource(),
            "projects/p/locations/europe-west4/publishers/google/models/gemini-2.0-flash-001"
        );

        let global = Config::new("p", "global", "publishers/google/models/m", "db");
        assert_eq!(global.vertex_endpoint(), "https://aiplatform.googleapis.com");
        assert_eq!(
            global.model_resource(),
            "projects/p/locations/global/publishers/google/models/m"
        );

        let qualified = Config::new("p", "us-central1", "projects/x/locations/y/models/z", "db")
            .with_vertex_base_url("http://127.0.0.1:1234/");
        assert_eq!(qualified.model_resource(), "projects/x/locations/y/models/z");
        assert_eq!(qualified.vertex_endpoint(), "http://127.0.0.1:1234");
    }
}
