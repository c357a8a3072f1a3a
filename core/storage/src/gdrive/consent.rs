//! Interactive OAuth2 consent over a loopback redirect.

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use tablegate_common::{Error, Result};

use super::auth::{AuthManager, Tokens};
use super::secrets::ClientSecrets;

/// How long the redirect server may take to finish its last response.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Obtains fresh tokens from the resource owner.
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn obtain(&self, secrets: &ClientSecrets) -> Result<Tokens>;
}

/// Consent flow for installed applications.
///
/// Listens on `127.0.0.1:<port>`, sends the user to the authorization
/// page and waits for Google to redirect back with a code.
#[derive(Debug, Clone)]
pub struct LoopbackConsent {
    port: u16,
    open_browser: bool,
}

impl LoopbackConsent {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            open_browser: true,
        }
    }

    /// Whether to launch the system browser in addition to printing the URL.
    pub fn open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }
}

#[async_trait]
impl ConsentFlow for LoopbackConsent {
    async fn obtain(&self, secrets: &ClientSecrets) -> Result<Tokens> {
        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| {
                Error::Authentication(format!(
                    "Cannot listen for the OAuth2 redirect on port {}: {}",
                    self.port, e
                ))
            })?;

        let redirect_url = format!("http://localhost:{}/", self.port);
        let auth = AuthManager::new(secrets, &redirect_url)?;
        let request = auth.authorization_url();

        eprintln!("Authorize access to Google Drive by visiting:\n\n    {}\n", request.url);
        if self.open_browser {
            if let Err(e) = open::that(&request.url) {
                warn!("Could not open a browser: {}", e);
            }
        }

        info!("Waiting for authorization on {}", redirect_url);
        let code = receive_code(listener, &request.state).await?;

        auth.exchange_code(&code, request.pkce_verifier).await
    }
}

/// Shared state of the redirect server.
struct RedirectState {
    expected_state: String,
    outcome: Mutex<Option<oneshot::Sender<Result<String>>>>,
}

/// What a redirect to `/` carries.
#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Code(String),
    Denied(String),
    StateMismatch,
}

impl Redirect {
    fn into_result(self) -> Result<String> {
        match self {
            Redirect::Code(code) => Ok(code),
            Redirect::Denied(error) => Err(Error::Authentication(format!(
                "Consent denied: {}",
                error
            ))),
            Redirect::StateMismatch => Err(Error::Authentication(
                "OAuth2 state mismatch on redirect".to_string(),
            )),
        }
    }
}

/// `None` when the request has neither a code nor an error.
fn classify(params: &HashMap<String, String>, expected_state: &str) -> Option<Redirect> {
    if let Some(error) = params.get("error") {
        return Some(Redirect::Denied(error.clone()));
    }

    let code = params.get("code")?;
    match params.get("state") {
        Some(state) if state == expected_state => Some(Redirect::Code(code.clone())),
        _ => Some(Redirect::StateMismatch),
    }
}

async fn handle_redirect(
    State(state): State<Arc<RedirectState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    let Some(redirect) = classify(&params, &state.expected_state) else {
        return (
            StatusCode::BAD_REQUEST,
            Html("<p>Missing authorization code.</p>"),
        );
    };

    let reply = match &redirect {
        Redirect::Code(_) => (
            StatusCode::OK,
            Html("<p>Authorization complete. You may close this window.</p>"),
        ),
        Redirect::Denied(_) => (StatusCode::OK, Html("<p>Authorization was not granted.</p>")),
        Redirect::StateMismatch => (
            StatusCode::BAD_REQUEST,
            Html("<p>Authorization state mismatch.</p>"),
        ),
    };

    let sender = state
        .outcome
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match sender {
        Some(sender) => {
            let _ = sender.send(redirect.into_result());
        }
        None => debug!("Ignoring redirect after authorization finished"),
    }

    reply
}

/// Serve redirects until one carries a code or an error.
///
/// Other paths (such as `/favicon.ico`) get a 404 and requests to `/`
/// without a code get a 400; neither ends the wait.
async fn receive_code(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let state = Arc::new(RedirectState {
        expected_state: expected_state.to_string(),
        outcome: Mutex::new(Some(outcome_tx)),
    });
    let router = Router::new()
        .route("/", get(handle_redirect))
        .with_state(state);

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // The sender lives in the router, so a failed server drops it.
    let outcome = outcome_rx.await.map_err(|_| {
        Error::Authentication("Redirect server stopped before authorization completed".to_string())
    });

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Err(e))) => debug!("Redirect server error: {}", e),
        Ok(Err(e)) => debug!("Redirect server task failed: {}", e),
        Err(_) => debug!("Redirect server did not shut down in time"),
        Ok(Ok(Ok(()))) => {}
    }

    outcome?
}
