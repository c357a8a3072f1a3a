//! Authenticated session with an explicit token lifecycle.

use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tablegate_common::{Error, Result};

use super::auth::{AuthManager, Tokens};
use super::consent::ConsentFlow;
use super::secrets::ClientSecrets;

/// JSON file holding persisted tokens.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored tokens. A missing file yields `None`.
    ///
    /// # Errors
    /// - `Serialization` if the file exists but is not a token document
    pub async fn load(&self) -> Result<Option<Tokens>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write tokens, replacing any previous file.
    pub async fn save(&self, tokens: &Tokens) -> Result<()> {
        let json = serde_json::to_string_pretty(tokens)?;
        tokio::fs::write(&self.path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }

    /// Remove the token file if present.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Authenticated session.
///
/// Owns the current tokens, refreshes them when they expire and keeps the
/// token store in sync. After `invalidate` every token request fails until
/// a new session is acquired.
pub struct Session {
    auth: AuthManager,
    store: Option<TokenStore>,
    tokens: RwLock<Option<Tokens>>,
}

impl Session {
    /// Create a session from known tokens.
    pub fn new(auth: AuthManager, tokens: Tokens, store: Option<TokenStore>) -> Self {
        Self {
            auth,
            store,
            tokens: RwLock::new(Some(tokens)),
        }
    }

    /// Acquire a session.
    ///
    /// Uses stored tokens when present, refreshing them if expired. If no
    /// tokens are stored, or the stored refresh token is rejected, runs the
    /// consent flow. The resulting tokens are persisted.
    ///
    /// # Errors
    /// - `Authentication` if consent is denied or the exchange fails
    /// - `Network` on transport failure
    pub async fn acquire(
        secrets: &ClientSecrets,
        store: TokenStore,
        consent: &dyn ConsentFlow,
    ) -> Result<Self> {
        let auth = AuthManager::new(secrets, secrets.default_redirect())?;

        if let Some(tokens) = store.load().await? {
            if !tokens.is_expired() {
                info!("Using stored credentials from {}", store.path().display());
                return Ok(Self::new(auth, tokens, Some(store)));
            }

            match auth.refresh_token(&tokens.refresh_token).await {
                Ok(fresh) => {
                    info!("Refreshed stored credentials");
                    store.save(&fresh).await?;
                    return Ok(Self::new(auth, fresh, Some(store)));
                }
                Err(Error::Authentication(e)) => {
                    warn!("Stored credentials rejected, requesting consent: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let tokens = consent.obtain(secrets).await?;
        store.save(&tokens).await?;
        info!("Authorization complete");

        Ok(Self::new(auth, tokens, Some(store)))
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// # Errors
    /// - `Authentication` if the session was invalidated or refresh failed
    pub async fn access_token(&self) -> Result<String> {
        {
            let tokens = self.tokens.read().await;
            match tokens.as_ref() {
                Some(t) if !t.is_expired() => return Ok(t.access_token.clone()),
                Some(_) => {}
                None => return Err(invalidated()),
            }
        }

        let mut tokens = self.tokens.write().await;

        // Double-check after acquiring write lock
        let refresh_token = match tokens.as_ref() {
            Some(t) if !t.is_expired() => return Ok(t.access_token.clone()),
            Some(t) => t.refresh_token.clone(),
            None => return Err(invalidated()),
        };

        info!("Refreshing expired access token");
        let fresh = self.auth.refresh_token(&refresh_token).await?;
        self.persist(&fresh).await?;

        let access_token = fresh.access_token.clone();
        *tokens = Some(fresh);
        Ok(access_token)
    }

    /// Refresh the access token now, regardless of expiry.
    pub async fn refresh(&self) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        let refresh_token = match tokens.as_ref() {
            Some(t) => t.refresh_token.clone(),
            None => return Err(invalidated()),
        };

        let fresh = self.auth.refresh_token(&refresh_token).await?;
        self.persist(&fresh).await?;
        *tokens = Some(fresh);
        Ok(())
    }

    /// Forget the tokens and delete the token file.
    pub async fn invalidate(&self) -> Result<()> {
        *self.tokens.write().await = None;
        if let Some(store) = &self.store {
            store.clear().await?;
            info!("Removed stored credentials at {}", store.path().display());
        }
        Ok(())
    }

    /// Whether the session still holds tokens.
    pub async fn is_active(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Get the current tokens.
    pub async fn tokens(&self) -> Option<Tokens> {
        self.tokens.read().await.clone()
    }

    async fn persist(&self, tokens: &Tokens) -> Result<()> {
        match &self.store {
            Some(store) => store.save(tokens).await,
            None => Ok(()),
        }
    }
}

fn invalidated() -> Error {
    Error::Authentication("Session has been invalidated".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn secrets() -> ClientSecrets {
        ClientSecrets::parse(r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#)
            .unwrap()
    }

    fn fresh_tokens(access: &str) -> Tokens {
        Tokens {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    /// Consent flow that hands out fixed tokens and counts invocations.
    struct FixedConsent {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConsentFlow for FixedConsent {
        async fn obtain(&self, _secrets: &ClientSecrets) -> Result<Tokens> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(fresh_tokens("from-consent"))
        }
    }

    struct DeniedConsent;

    #[async_trait]
    impl ConsentFlow for DeniedConsent {
        async fn obtain(&self, _secrets: &ClientSecrets) -> Result<Tokens> {
            Err(Error::Authentication("access_denied".to_string()))
        }
    }

    #[tokio::test]
    async fn test_token_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        assert!(store.load().await.unwrap().is_none());

        store.save(&fresh_tokens("abc")).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "abc");
        assert_eq!(loaded.refresh_token, "refresh");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_token_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();

        let result = TokenStore::new(path).load().await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_acquire_runs_consent_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let consent = FixedConsent {
            calls: AtomicUsize::new(0),
        };

        let session = Session::acquire(&secrets(), store.clone(), &consent)
            .await
            .unwrap();
        assert_eq!(session.access_token().await.unwrap(), "from-consent");
        assert_eq!(consent.calls.load(Ordering::SeqCst), 1);
        assert!(store.load().await.unwrap().is_some());

        // Second acquisition reuses the stored token without consent.
        let again = Session::acquire(&secrets(), store, &consent).await.unwrap();
        assert_eq!(again.access_token().await.unwrap(), "from-consent");
        assert_eq!(consent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_propagates_denied_consent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        let result = Session::acquire(&secrets(), store.clone(), &DeniedConsent).await;
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&fresh_tokens("abc")).await.unwrap();

        let auth = AuthManager::new(&secrets(), "http://localhost").unwrap();
        let session = Session::new(auth, fresh_tokens("abc"), Some(store.clone()));
        assert!(session.is_active().await);

        session.invalidate().await.unwrap();

        assert!(!session.is_active().await);
        assert!(matches!(
            session.access_token().await,
            Err(Error::Authentication(_))
        ));
        assert!(matches!(session.refresh().await, Err(Error::Authentication(_))));
        assert!(store.load().await.unwrap().is_none());
    }
}
