//! Google Drive backend for tablegate.
//!
//! This module provides:
//! - Client secret parsing for installed-app OAuth2 credentials
//! - OAuth2 authorization, code exchange and token refresh
//! - An explicit session object with a persisted token file
//! - A loopback consent flow for the first authorization
//! - A `DriveApi` implementation over the Drive v3 REST API

pub mod auth;
pub mod client;
pub mod consent;
pub mod secrets;
pub mod session;

pub use auth::{AuthManager, AuthorizationRequest, Tokens};
pub use client::DriveClient;
pub use consent::{ConsentFlow, LoopbackConsent};
pub use secrets::ClientSecrets;
pub use session::{Session, TokenStore};
