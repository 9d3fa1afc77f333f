use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use validator::Validate;

/// What the finalizer does when several existing resources share a staged file's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguousMatchPolicy {
    /// Refuse to guess: the file stays staged and is reported as failed.
    #[default]
    Reject,
    /// Create yet another resource with the same name.
    Create,
}

impl FromStr for AmbiguousMatchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "create" => Ok(Self::Create),
            other => Err(anyhow!("Unknown ambiguous match policy: {}", other)),
        }
    }
}

/// Upload staging configuration, resolved once at startup
#[derive(Debug, Clone, Validate)]
pub struct UploaderConfig {
    /// Storage root shared with the host platform (default: "./storage")
    pub storage_path: PathBuf,

    /// Sub-path of the storage root holding staged uploads (default: "file_uploader_ui")
    #[validate(length(min = 1, message = "Staging sub-path must not be empty"))]
    pub staging_subpath: String,

    /// Field values forced onto every created or updated resource
    pub resource_defaults: Map<String, Value>,

    /// Largest accepted request body for one chunk (default: 10 MB)
    #[validate(range(min = 1, message = "Chunk size limit must be positive"))]
    pub max_chunk_size: usize,

    pub ambiguous_match_policy: AmbiguousMatchPolicy,

    /// Base URL of the host platform action API
    pub platform_url: String,

    /// Service API key, used when a request carries no credentials of its own
    pub platform_api_key: Option<String>,

    /// Optional JSON document describing per-resource-type field defaults
    pub schema_defaults_path: Option<PathBuf>,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./storage"),
            staging_subpath: "file_uploader_ui".to_string(),
            resource_defaults: Map::new(),
            max_chunk_size: 10 * 1024 * 1024, // 10 MB
            ambiguous_match_policy: AmbiguousMatchPolicy::Reject,
            platform_url: "http://localhost:5000".to_string(),
            platform_api_key: None,
            schema_defaults_path: None,
            allowed_origins: vec![
                "http://localhost:5000".to_string(),
                "http://127.0.0.1:5000".to_string(),
            ],
        }
    }
}

impl UploaderConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let default = Self::default();

        let resource_defaults = match env::var("FILE_UPLOADER_UI_DEFAULTS") {
            Ok(raw) => parse_resource_defaults(&raw)?,
            Err(_) => default.resource_defaults,
        };

        let ambiguous_match_policy = match env::var("AMBIGUOUS_MATCH_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => default.ambiguous_match_policy,
        };

        let config = Self {
            storage_path: env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.storage_path),

            staging_subpath: env::var("FILE_UPLOADER_UI_PATH").unwrap_or(default.staging_subpath),

            resource_defaults,

            max_chunk_size: env::var("MAX_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_chunk_size),

            ambiguous_match_policy,

            platform_url: env::var("PLATFORM_URL").unwrap_or(default.platform_url),

            platform_api_key: env::var("PLATFORM_API_KEY").ok().filter(|v| !v.is_empty()),

            schema_defaults_path: env::var("SCHEMA_DEFAULTS_PATH").ok().map(PathBuf::from),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        };

        config.validate().context("Invalid uploader configuration")?;
        Ok(config)
    }

    /// Config rooted at an arbitrary directory, used by local runs and tests
    pub fn development(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            allowed_origins: vec!["*".to_string()],
            ..Self::default()
        }
    }

    /// Directory under which each dataset gets its own staging area
    pub fn staging_root(&self) -> PathBuf {
        self.storage_path.join(&self.staging_subpath)
    }
}

/// Parses the JSON-encoded defaults mapping. An empty string means no defaults.
pub fn parse_resource_defaults(raw: &str) -> Result<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw).context("FILE_UPLOADER_UI_DEFAULTS is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "FILE_UPLOADER_UI_DEFAULTS must be a JSON object, got: {}",
            other
        )),
    }
}
