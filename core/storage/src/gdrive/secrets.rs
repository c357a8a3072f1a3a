//! OAuth2 client secrets as downloaded from the Google Cloud console.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tablegate_common::{Error, Result};

/// Default OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Default OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// OAuth2 client credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Layout of a `client_secret_*.json` file.
#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a client secrets document.
    ///
    /// Accepts the `installed` (desktop app) or `web` layout; `installed`
    /// wins when both are present.
    pub fn parse(json: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(json)
            .map_err(|e| Error::Authentication(format!("Invalid client secrets: {}", e)))?;

        let secrets = file.installed.or(file.web).ok_or_else(|| {
            Error::Authentication(
                "Client secrets must contain an 'installed' or 'web' section".to_string(),
            )
        })?;

        if secrets.client_id.is_empty() {
            return Err(Error::Authentication(
                "Client secrets have an empty client_id".to_string(),
            ));
        }

        Ok(secrets)
    }

    /// Read and parse a client secrets file.
    ///
    /// # Errors
    /// - `Authentication` if the file is missing or malformed
    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Authentication(format!(
                "Cannot read client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&json)
    }

    /// Redirect URI used when no consent flow supplies one.
    pub fn default_redirect(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost")
    }
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
