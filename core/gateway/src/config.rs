//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tablegate_common::{Error, Result};

fn default_token_file() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_auth_port() -> u16 {
    8080
}

fn default_open_browser() -> bool {
    true
}

/// Configuration for [`DataGateway::connect`](crate::DataGateway::connect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Drive id of the root folder holding all tables.
    pub folder_id: String,
    /// Path to the OAuth2 client secrets JSON.
    pub client_config_file: PathBuf,
    /// Where tokens are persisted between runs.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    /// Loopback port for the consent redirect.
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    /// Open the consent page in a browser.
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
    /// Remember table folder ids between calls.
    #[serde(default)]
    pub cache_folder_ids: bool,
}

impl GatewayConfig {
    pub fn new(folder_id: impl Into<String>, client_config_file: impl Into<PathBuf>) -> Self {
        Self {
            folder_id: folder_id.into(),
            client_config_file: client_config_file.into(),
            token_file: default_token_file(),
            auth_port: default_auth_port(),
            open_browser: default_open_browser(),
            cache_folder_ids: false,
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::InvalidInput(format!("Cannot read configuration {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.folder_id.trim().is_empty() {
            return Err(Error::InvalidInput("folder_id cannot be empty".to_string()));
        }
        if self.client_config_file.as_os_str().is_empty() {
            return Err(Error::InvalidInput(
                "client_config_file cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = GatewayConfig::from_json(
            r#"{"folder_id": "1AbC", "client_config_file": "client_secrets.json"}"#,
        )
        .unwrap();

        assert_eq!(config, GatewayConfig::new("1AbC", "client_secrets.json"));
        assert_eq!(config.token_file, PathBuf::from("token.json"));
        assert_eq!(config.auth_port, 8080);
        assert!(config.open_browser);
        assert!(!config.cache_folder_ids);
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_json(
            r#"{
                "folder_id": "1AbC",
                "client_config_file": "secrets.json",
                "token_file": "/tmp/tok.json",
                "auth_port": 9000,
                "open_browser": false,
                "cache_folder_ids": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.token_file, PathBuf::from("/tmp/tok.json"));
        assert_eq!(config.auth_port, 9000);
        assert!(!config.open_browser);
        assert!(config.cache_folder_ids);
    }

    #[test]
    fn test_missing_required_field() {
        let result = GatewayConfig::from_json(r#"{"folder_id": "1AbC"}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_empty_folder_id() {
        let result =
            GatewayConfig::from_json(r#"{"folder_id": " ", "client_config_file": "s.json"}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"folder_id": "root", "client_config_file": "secrets.json"}"#,
        )
        .unwrap();

        let config = GatewayConfig::from_file(&path).await.unwrap();
        assert_eq!(config.folder_id, "root");

        let missing = GatewayConfig::from_file(&dir.path().join("nope.json")).await;
        assert!(missing.is_err());
    }
}
