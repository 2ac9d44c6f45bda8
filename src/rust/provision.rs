//! Startup provisioning: service credentials and model artifacts.
//!
//! Runs before the classifier is loaded and before the listener is bound. Every error
//! here is fatal to startup.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, CredentialsConfig};
use crate::model_manager::{ModelError, ModelManager};

/// Environment variable cloud SDKs read the credential file location from.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// The credential path to export as [`CREDENTIALS_ENV`], if credentials are in play.
///
/// Depends only on configuration and the cache, so it is known before anything is fetched.
pub fn credentials_env_path(config: &CredentialsConfig) -> Option<&Path> {
    (has_credential_source(config) || config.path.is_file()).then_some(config.path.as_path())
}

/// Provisions credentials and the model, returning the manager that holds the cache.
///
/// With `fresh`, cached downloads are removed first so everything is fetched again.
/// The process environment is left untouched.
pub async fn bootstrap(config: &Config, fresh: bool) -> Result<ModelManager, ModelError> {
    let manager = ModelManager::new(config.cache_dir.join("models"))?
        .with_registry_base(&config.registry_base);
    let model = &config.classifier.model;

    if fresh {
        log::info!("Removing cached artifacts for '{}'", model.name);
        manager.remove_download(model)?;
        if has_credential_source(&config.credentials) && config.credentials.path.exists() {
            fs::remove_file(&config.credentials.path)?;
        }
    }

    if let Some(path) = provision_credentials(&config.credentials).await? {
        log::info!("Credentials available at {:?}", path);
    }

    manager.ensure_model_downloaded(model).await?;
    log::info!("Bootstrap complete for model '{}' ({})", model.name, config.classifier.backend);
    Ok(manager)
}

fn has_credential_source(config: &CredentialsConfig) -> bool {
    config.payload.is_some() || config.url.is_some()
}

/// Materializes the credential file, reusing a valid cached copy.
///
/// Returns `None` when no credentials are configured and no file is present.
pub async fn provision_credentials(config: &CredentialsConfig) -> Result<Option<PathBuf>, ModelError> {
    let path = &config.path;
    if path.is_file() {
        let bytes = fs::read(path)?;
        validate_credentials(&bytes)?;
        log::info!("Using cached credentials at {:?}", path);
        return Ok(Some(path.clone()));
    }

    let bytes = if let Some(payload) = &config.payload {
        payload.as_bytes().to_vec()
    } else if let Some(url) = &config.url {
        log::info!("Downloading credentials");
        let response = reqwest::get(url.as_str()).await?.error_for_status()?;
        response.bytes().await?.to_vec()
    } else {
        log::info!("No credentials configured");
        return Ok(None);
    };

    validate_credentials(&bytes)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    log::info!("Credentials written to {:?}", path);
    Ok(Some(path.clone()))
}

fn validate_credentials(bytes: &[u8]) -> Result<(), ModelError> {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(serde_json::Value::Object(_)) => Ok(()),
        Ok(_) => Err(ModelError::Credentials("expected a JSON object".to_string())),
        Err(e) => Err(ModelError::Credentials(format!("invalid JSON: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(dir: &std::path::Path, payload: Option<&str>) -> CredentialsConfig {
        CredentialsConfig {
            payload: payload.map(str::to_string),
            url: None,
            path: dir.join("creds").join("credentials.json"),
        }
    }

    #[tokio::test]
    async fn test_inline_payload_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = credentials(dir.path(), Some(r#"{"type":"service_account"}"#));
        let path = provision_credentials(&config).await.unwrap().unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), r#"{"type":"service_account"}"#);
    }

    #[tokio::test]
    async fn test_non_object_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for payload in ["[1, 2]", "not json"] {
            let config = credentials(dir.path(), Some(payload));
            assert!(matches!(
                provision_credentials(&config).await,
                Err(ModelError::Credentials(_))
            ));
            assert!(!config.path.exists());
        }
    }

    #[test]
    fn test_credentials_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = credentials(dir.path(), None);
        assert!(credentials_env_path(&config).is_none());

        let config = credentials(dir.path(), Some("{}"));
        assert_eq!(credentials_env_path(&config), Some(config.path.as_path()));
    }

    #[test]
    fn test_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let provisioned = tokio_test::block_on(provision_credentials(&credentials(dir.path(), None)));
        assert!(provisioned.unwrap().is_none());
    }
}
