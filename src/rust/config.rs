//! Service configuration, read from the environment.
//!
//! Every value has an environment variable; `Config::from_lookup` takes the lookup as a
//! function so tests never touch the process environment.

use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::models::{ModelBackend, ModelInfo, ModelSource, DEFAULT_REGISTRY_BASE};

pub const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";
pub const DEFAULT_MODEL_NAME: &str = "esi_model";
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 256;
pub const DEFAULT_MAX_INPUT_CHARS: usize = 1000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Chat-platform credentials and endpoint.
#[derive(Clone)]
pub struct LineConfig {
    pub access_token: String,
    pub channel_secret: String,
    pub api_base: String,
}

impl fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineConfig")
            .field("access_token", &"<redacted>")
            .field("channel_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Cloud credential bootstrap: an inline payload or a URL, cached at `path`.
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    pub payload: Option<String>,
    pub url: Option<String>,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub backend: ModelBackend,
    pub model: ModelInfo,
    /// Token bound for the fixed-label model.
    pub max_sequence_length: usize,
    /// Character bound for prompts sent to the generative backend.
    pub max_input_chars: usize,
    pub use_accelerator: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub line: LineConfig,
    pub credentials: CredentialsConfig,
    pub classifier: ClassifierConfig,
    pub server: ServerConfig,
    /// Root of the local artifact cache.
    pub cache_dir: PathBuf,
    /// Base URL `hf:` model sources are downloaded from.
    pub registry_base: String,
}

impl Config {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let line = LineConfig {
            access_token: get("LINE_ACCESS_TOKEN").ok_or(ConfigError::Missing("LINE_ACCESS_TOKEN"))?,
            channel_secret: get("LINE_CHANNEL_SECRET").ok_or(ConfigError::Missing("LINE_CHANNEL_SECRET"))?,
            api_base: get("LINE_API_BASE")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_LINE_API_BASE.to_string()),
        };

        let cache_dir = get("ESI_TRIAGE_CACHE")
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        let credentials = CredentialsConfig {
            payload: get("CREDENTIALS_JSON"),
            url: get("CREDENTIALS_URL"),
            path: get("CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| cache_dir.join("credentials.json")),
        };

        let backend = match get("MODEL_BACKEND") {
            Some(raw) => raw.parse::<ModelBackend>().map_err(|message| ConfigError::Invalid {
                key: "MODEL_BACKEND",
                message,
            })?,
            None => ModelBackend::default(),
        };
        let raw_source = get("MODEL_SOURCE").ok_or(ConfigError::Missing("MODEL_SOURCE"))?;
        let source = ModelSource::parse(&raw_source, backend).map_err(|message| ConfigError::Invalid {
            key: "MODEL_SOURCE",
            message,
        })?;
        let mut model = ModelInfo::new(
            get("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            source,
        );
        if let Some(hash) = get("MODEL_SHA256") {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid {
                    key: "MODEL_SHA256",
                    message: "expected 64 hex characters".to_string(),
                });
            }
            model = model.with_sha256(hash);
        }

        let classifier = ClassifierConfig {
            backend,
            model,
            max_sequence_length: parse_positive(&get, "MAX_SEQUENCE_LENGTH", DEFAULT_MAX_SEQUENCE_LENGTH)?,
            max_input_chars: parse_positive(&get, "MAX_INPUT_CHARS", DEFAULT_MAX_INPUT_CHARS)?,
            use_accelerator: get("USE_ACCELERATOR").map(|v| parse_flag(&v)).unwrap_or(false),
        };

        let server = ServerConfig {
            bind: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: match get("PORT") {
                Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                    key: "PORT",
                    message: e.to_string(),
                })?,
                None => DEFAULT_PORT,
            },
            worker_concurrency: parse_positive(&get, "WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY)?,
            queue_capacity: parse_positive(&get, "WORKER_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?,
        };

        let registry_base = get("MODEL_REGISTRY_BASE")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_REGISTRY_BASE.to_string());

        Ok(Self {
            line,
            credentials,
            classifier,
            server,
            cache_dir,
            registry_base,
        })
    }
}

/// Returns the default cache directory path
pub fn default_cache_dir() -> PathBuf {
    // 1. Use platform-specific cache directory
    if let Some(cache_dir) = dirs::cache_dir() {
        return cache_dir.join("esi-triage");
    }

    // 2. Fallback to user's home directory
    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".cache").join("esi-triage");
    }

    // 3. If all else fails, use system temp directory
    env::temp_dir().join("esi-triage")
}

fn parse_positive<G>(get: &G, key: &'static str, default: usize) -> Result<usize, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) => Err(ConfigError::Invalid {
                key,
                message: "must be greater than zero".to_string(),
            }),
            Ok(n) => Ok(n),
            Err(e) => Err(ConfigError::Invalid {
                key,
                message: e.to_string(),
            }),
        },
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on" | "cuda" | "gpu")
}
