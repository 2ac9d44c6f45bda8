use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Number of ESI levels; also the number of logits a fixed-label model must emit.
pub const NUM_LEVELS: usize = 5;

/// Base URL registry (`hf:`) sources are resolved against.
pub const DEFAULT_REGISTRY_BASE: &str = "https://huggingface.co";

/// Which kind of model backs the severity classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelBackend {
    /// Sequence-classification model exported to ONNX, five output labels.
    #[default]
    Onnx,
    /// Text-generation server prompted for a level.
    Generative,
}

impl fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Generative => write!(f, "generative"),
        }
    }
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" | "classification" | "" => Ok(Self::Onnx),
            "generative" | "generation" | "llm" => Ok(Self::Generative),
            other => Err(format!("unknown model backend '{}' (expected onnx or generative)", other)),
        }
    }
}

/// Where the model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Zip archive fetched over HTTP and extracted into the cache.
    Archive { url: String },
    /// HuggingFace repository holding `model.onnx` and `tokenizer.json`.
    Registry { repo: String },
    /// Pre-provisioned local directory.
    Directory(PathBuf),
    /// Base URL of a text-generation server.
    Endpoint { url: String },
}

impl ModelSource {
    /// Interprets a raw `MODEL_SOURCE` value for the given backend.
    ///
    /// - `hf:<owner>/<repo>` is a registry identifier
    /// - an http(s) URL ending in `.zip` (query string ignored) is an archive
    /// - any other http(s) URL is a generation endpoint, valid only for the generative backend
    /// - anything else is a local directory
    pub fn parse(raw: &str, backend: ModelBackend) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("model source cannot be empty".to_string());
        }
        if let Some(repo) = raw.strip_prefix("hf:") {
            let repo = repo.trim_matches('/');
            if repo.is_empty() {
                return Err("registry identifier is missing a repository name".to_string());
            }
            return Ok(Self::Registry { repo: repo.to_string() });
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let path = raw.split(['?', '#']).next().unwrap_or(raw);
            if path.to_ascii_lowercase().ends_with(".zip") {
                return Ok(Self::Archive { url: raw.to_string() });
            }
            return match backend {
                ModelBackend::Generative => Ok(Self::Endpoint {
                    url: raw.trim_end_matches('/').to_string(),
                }),
                ModelBackend::Onnx => Err(format!(
                    "'{}' is neither a .zip archive nor a registry identifier",
                    raw
                )),
            };
        }
        Ok(Self::Directory(PathBuf::from(raw)))
    }
}

/// Identifies a model and how to obtain it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Cache subdirectory name; for the generative backend, also the model name sent to the server.
    pub name: String,
    pub source: ModelSource,
    /// Expected SHA-256 (lowercase hex) of the downloaded archive or model file.
    pub sha256: Option<String>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, source: ModelSource) -> Self {
        Self {
            name: name.into(),
            source,
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, hash: impl Into<String>) -> Self {
        self.sha256 = Some(hash.into().to_ascii_lowercase());
        self
    }

    /// Download URLs for a registry model under `base`: `(model_url, tokenizer_url)`.
    pub fn registry_urls(base: &str, repo: &str) -> (String, String) {
        let base = base.trim_end_matches('/');
        (
            format!("{}/{}/resolve/main/model.onnx", base, repo),
            format!("{}/{}/resolve/main/tokenizer.json", base, repo),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    pub num_labels: usize,
    pub max_sequence_length: usize,
}

impl Default for ModelCharacteristics {
    fn default() -> Self {
        Self {
            num_labels: NUM_LEVELS,
            max_sequence_length: 256,
        }
    }
}
