use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

use crate::models::{ModelInfo, ModelSource, DEFAULT_REGISTRY_BASE};

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
    #[error("{file} not found under {}", .dir.display())]
    MissingArtifact { file: &'static str, dir: PathBuf },
    #[error("Model source {0} has no local artifacts")]
    UnsupportedSource(String),
    #[error("Credentials error: {0}")]
    Credentials(String),
}

/// Local paths of a provisioned fixed-label model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// Downloads, verifies and caches model artifacts under one directory.
#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    registry_base: String,
    download_lock: Arc<Mutex<()>>,
    client: reqwest::Client,
}

impl ModelManager {
    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            registry_base: DEFAULT_REGISTRY_BASE.to_string(),
            download_lock: Arc::new(Mutex::new(())),
            client: reqwest::Client::new(),
        })
    }

    /// Resolves `hf:` sources against `base` instead of the public registry.
    pub fn with_registry_base(mut self, base: impl Into<String>) -> Self {
        self.registry_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Directory a downloaded model is extracted or saved into.
    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.models_dir.join(name)
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{}.zip", name))
    }

    /// Finds the model and tokenizer for `info` without downloading anything.
    pub fn locate(&self, info: &ModelInfo) -> Result<ModelArtifacts, ModelError> {
        match &info.source {
            ModelSource::Directory(dir) => find_artifacts(dir),
            ModelSource::Archive { .. } | ModelSource::Registry { .. } => find_artifacts(&self.model_dir(&info.name)),
            ModelSource::Endpoint { url } => Err(ModelError::UnsupportedSource(url.clone())),
        }
    }

    pub fn is_model_downloaded(&self, info: &ModelInfo) -> bool {
        let found = self.locate(info);
        log::info!("Checking if model '{}' is available: {}", info.name, found.is_ok());
        found.is_ok()
    }

    /// Ensures that a model is available locally, downloading it on first use.
    ///
    /// Generation endpoints have nothing to fetch and return immediately. Local directories
    /// are only checked.
    pub async fn ensure_model_downloaded(&self, info: &ModelInfo) -> Result<(), ModelError> {
        match &info.source {
            ModelSource::Endpoint { url } => {
                log::info!("Model '{}' is served by {}, nothing to download", info.name, url);
                Ok(())
            }
            ModelSource::Directory(_) => self.locate(info).map(|_| ()),
            ModelSource::Archive { url } => {
                if self.is_model_downloaded(info) {
                    log::info!("Model '{}' found in cache", info.name);
                    return Ok(());
                }
                let _lock = self.download_lock.lock().await;
                self.download_archive(info, url).await
            }
            ModelSource::Registry { repo } => {
                if self.is_model_downloaded(info) {
                    log::info!("Model '{}' found in cache", info.name);
                    return Ok(());
                }
                let _lock = self.download_lock.lock().await;
                self.download_registry(info, repo).await
            }
        }
    }

    async fn download_archive(&self, info: &ModelInfo, url: &str) -> Result<(), ModelError> {
        let archive_path = self.archive_path(&info.name);
        let cached = archive_path.exists()
            && match &info.sha256 {
                Some(expected) => self.verify_file(&archive_path, expected)?,
                None => true,
            };

        if cached {
            log::info!("Reusing cached archive {:?}", archive_path);
            match self.unpack_archive(&archive_path, &info.name) {
                Ok(()) => return Ok(()),
                Err(e) => log::warn!("Cached archive unusable ({}), downloading again", e),
            }
        }

        self.download_and_verify_file(url, &archive_path, info.sha256.as_deref(), "archive").await?;
        self.unpack_archive(&archive_path, &info.name)
    }

    /// Extracts the archive and checks it holds the model. On failure neither the
    /// extracted directory nor the archive is kept.
    fn unpack_archive(&self, archive_path: &Path, name: &str) -> Result<(), ModelError> {
        let model_dir = self.model_dir(name);
        let result = extract_archive(archive_path, &model_dir).and_then(|()| find_artifacts(&model_dir));
        match result {
            Ok(artifacts) => {
                log::info!("Model ready at {:?}", artifacts.model_path);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to unpack {:?}: {}", archive_path, e);
                let _ = fs::remove_dir_all(&model_dir);
                let _ = fs::remove_file(archive_path);
                Err(e)
            }
        }
    }

    async fn download_registry(&self, info: &ModelInfo, repo: &str) -> Result<(), ModelError> {
        let (model_url, tokenizer_url) = ModelInfo::registry_urls(&self.registry_base, repo);
        let model_dir = self.model_dir(&info.name);
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        let model_result = self
            .download_and_verify_file(&model_url, &model_path, info.sha256.as_deref(), "model")
            .await;
        let tokenizer_result = match model_result {
            Ok(()) => self.download_and_verify_file(&tokenizer_url, &tokenizer_path, None, "tokenizer").await,
            Err(e) => Err(e),
        };

        match tokenizer_result {
            Ok(()) => {
                log::info!("Model and tokenizer ready to use");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to set up model '{}': {}", info.name, e);
                // Cleanup on failure
                let _ = self.remove_download(info);
                Err(e)
            }
        }
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        log::info!("Verifying file: {:?}", path);
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash == expected_hash)
    }

    /// Checks the cached archive or model file against `info.sha256`.
    ///
    /// Returns `Ok(true)` when no hash is configured and the artifacts are present.
    pub fn verify_model(&self, info: &ModelInfo) -> Result<bool, ModelError> {
        let artifacts = match self.locate(info) {
            Ok(artifacts) => artifacts,
            Err(_) => return Ok(false),
        };
        let Some(expected) = info.sha256.as_deref() else {
            return Ok(true);
        };
        let target = match info.source {
            ModelSource::Archive { .. } => self.archive_path(&info.name),
            _ => artifacts.model_path,
        };
        if !target.exists() {
            return Ok(false);
        }
        self.verify_file(&target, expected)
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = self.client.get(url).send().await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = expected_hash {
            let hash = sha256_hex(&bytes);
            if hash != expected {
                log::error!("{} hash mismatch: expected {}, got {}", file_type, expected, hash);
                return Err(ModelError::HashMismatch {
                    file_type: file_type.to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Written under a temporary name so an interrupted start never leaves a partial file.
        let partial = path.with_extension("part");
        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, path)?;

        // Verify after writing
        if let Some(expected) = expected_hash {
            if !self.verify_file(path, expected)? {
                return Err(ModelError::VerificationFailed);
            }
        }

        log::info!("{} file downloaded successfully", file_type);
        Ok(())
    }

    /// Removes every cached file for `info`. Local directories are never touched.
    pub fn remove_download(&self, info: &ModelInfo) -> Result<(), ModelError> {
        if matches!(info.source, ModelSource::Directory(_) | ModelSource::Endpoint { .. }) {
            return Ok(());
        }
        let model_dir = self.model_dir(&info.name);
        if model_dir.exists() {
            fs::remove_dir_all(&model_dir)?;
        }
        let archive_path = self.archive_path(&info.name);
        if archive_path.exists() {
            fs::remove_file(&archive_path)?;
        }
        Ok(())
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Extracts a zip archive into `dest`. Entries that would escape `dest` are refused by the
/// zip crate.
fn extract_archive(archive_path: &Path, dest: &Path) -> Result<(), ModelError> {
    log::info!("Extracting {:?} into {:?}", archive_path, dest);
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(io::BufReader::new(file))?;
    fs::create_dir_all(dest)?;
    archive.extract(dest)?;
    log::info!("Extracted {} entries", archive.len());
    Ok(())
}

/// Locates `model.onnx` and `tokenizer.json` in `dir` or one directory level below it.
///
/// Archives are commonly zipped with a top-level folder (`esi_model/model.onnx`), and
/// exported models sometimes keep the graph in an `onnx/` subfolder.
pub fn find_artifacts(dir: &Path) -> Result<ModelArtifacts, ModelError> {
    if !dir.is_dir() {
        return Err(ModelError::NotDownloaded(dir.display().to_string()));
    }
    Ok(ModelArtifacts {
        model_path: find_file(dir, MODEL_FILE)?,
        tokenizer_path: find_file(dir, TOKENIZER_FILE)?,
    })
}

fn find_file(dir: &Path, file: &'static str) -> Result<PathBuf, ModelError> {
    let direct = dir.join(file);
    if direct.is_file() {
        return Ok(direct);
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    subdirs
        .into_iter()
        .map(|sub| sub.join(file))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ModelError::MissingArtifact {
            file,
            dir: dir.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_artifacts_nested() -> Result<(), ModelError> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("esi_model");
        fs::create_dir_all(nested.join("onnx"))?;
        fs::write(nested.join("onnx").join(MODEL_FILE), b"graph")?;
        fs::write(dir.path().join(TOKENIZER_FILE), b"{}")?;

        // Two levels down is too deep for the model file.
        assert!(matches!(
            find_artifacts(dir.path()),
            Err(ModelError::MissingArtifact { file: MODEL_FILE, .. })
        ));

        // The tokenizer sits above the nested folder.
        assert!(find_artifacts(&nested).is_err());

        fs::write(nested.join(MODEL_FILE), b"graph")?;
        let artifacts = find_artifacts(dir.path())?;
        assert_eq!(artifacts.model_path, nested.join(MODEL_FILE));
        assert_eq!(artifacts.tokenizer_path, dir.path().join(TOKENIZER_FILE));
        Ok(())
    }

    #[test]
    fn test_locate_directory_source() -> Result<(), ModelError> {
        let cache = tempfile::tempdir()?;
        let model_dir = tempfile::tempdir()?;
        fs::write(model_dir.path().join(MODEL_FILE), b"graph")?;
        fs::write(model_dir.path().join(TOKENIZER_FILE), b"{}")?;

        let manager = ModelManager::new(cache.path())?;
        let info = ModelInfo::new("local", ModelSource::Directory(model_dir.path().to_path_buf()));
        assert!(manager.is_model_downloaded(&info));
        assert!(manager.verify_model(&info)?);

        // Removing a directory-sourced model must leave the directory alone.
        manager.remove_download(&info)?;
        assert!(model_dir.path().join(MODEL_FILE).exists());
        Ok(())
    }

    #[test]
    fn test_endpoint_has_no_artifacts() -> Result<(), ModelError> {
        let cache = tempfile::tempdir()?;
        let manager = ModelManager::new(cache.path())?;
        let info = ModelInfo::new("medgpt", ModelSource::Endpoint { url: "http://127.0.0.1:11434".into() });
        assert!(matches!(manager.locate(&info), Err(ModelError::UnsupportedSource(_))));
        Ok(())
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
