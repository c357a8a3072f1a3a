//! OAuth2 authorization and token exchange for Google Drive.

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    HttpClientError, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use tablegate_common::{Error, Result};

use super::secrets::ClientSecrets;

/// Google Drive OAuth2 scope. Full access is needed because the root
/// folder is created outside this application.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Lifetime assumed when the token endpoint does not report one.
const DEFAULT_EXPIRY_SECS: u64 = 3600;

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 tokens with expiration tracking.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: String,
    /// When the access token expires.
    #[zeroize(skip)]
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

impl std::fmt::Debug for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A pending authorization: the URL the user must visit plus the values
/// needed to complete the exchange.
pub struct AuthorizationRequest {
    /// URL to open in a browser.
    pub url: String,
    /// CSRF state that must come back on the redirect.
    pub state: String,
    /// PKCE verifier for the code exchange.
    pub pkce_verifier: PkceCodeVerifier,
}

/// OAuth2 authentication manager for Google Drive.
pub struct AuthManager {
    client: GoogleClient,
    http: oauth2::reqwest::Client,
}

impl AuthManager {
    /// Create a new authentication manager.
    ///
    /// # Errors
    /// - `InvalidInput` if an endpoint or the redirect URL is malformed
    /// - `Network` if the HTTP client cannot be built
    pub fn new(secrets: &ClientSecrets, redirect_url: &str) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(secrets.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(secrets.auth_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(secrets.token_uri.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(redirect_url.to_string())
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            );

        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, http })
    }

    /// Generate the authorization URL for the user to visit.
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationRequest {
            url: auth_url.to_string(),
            state: csrf_token.secret().clone(),
            pkce_verifier,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    /// - `Authentication` if the code is rejected or no refresh token is issued
    /// - `Network` on transport failure
    pub async fn exchange_code(&self, code: &str, verifier: PkceCodeVerifier) -> Result<Tokens> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| token_error("Token exchange failed", e))?;

        let refresh_token = response
            .refresh_token()
            .ok_or_else(|| {
                Error::Authentication("No refresh token received. Ensure 'offline' access and 'consent' prompt were requested.".to_string())
            })?
            .secret()
            .clone();

        Ok(tokens_from_response(&response, refresh_token))
    }

    /// Refresh an access token using the refresh token.
    ///
    /// # Errors
    /// - `Authentication` if the refresh token is invalid or revoked
    /// - `Network` on transport failure
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| token_error("Token refresh failed", e))?;

        // Refresh tokens may or may not be returned in refresh response
        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().clone())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(tokens_from_response(&response, refresh_token))
    }
}

fn tokens_from_response(response: &BasicTokenResponse, refresh_token: String) -> Tokens {
    let expires_in = response
        .expires_in()
        .unwrap_or_else(|| std::time::Duration::from_secs(DEFAULT_EXPIRY_SECS));

    Tokens {
        access_token: response.access_token().secret().clone(),
        refresh_token,
        expires_at: Utc::now()
            + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1)),
    }
}

fn token_error(
    context: &str,
    err: BasicRequestTokenError<HttpClientError<oauth2::reqwest::Error>>,
) -> Error {
    let message = format!("{}: {}", context, err);
    match err {
        RequestTokenError::Request(_) => Error::Network(message),
        _ => Error::Authentication(message),
    }
}
