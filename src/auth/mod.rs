//! Identity collaborator
//!
//! `AuthProvider` is the seam to the identity service. Two providers exist:
//! Firebase (Google device-code sign-in exchanged for a Firebase session) and
//! a local provider that signs in a configured identity. `Session` wraps the
//! active provider and is what the rest of the client reads identity from.

pub mod firebase;
pub mod local;
pub mod oauth;
pub mod session;
pub mod tokens;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::models::Identity;

pub use session::Session;
pub use tokens::{SessionStore, StoredSession, StoredToken};

/// Errors from sign-in, sign-out and token refresh.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("OAuth flow failed: {0}")]
    OAuth(String),

    #[error("Google did not return an ID token")]
    MissingIdToken,

    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} rejected the request (HTTP {status}): {body}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed response from {endpoint}: {detail}")]
    Decode {
        endpoint: &'static str,
        detail: String,
    },

    #[error("session expired, sign in again")]
    SessionExpired,
}

/// What the user must do to finish an interactive device-code sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePrompt {
    pub verification_url: String,
    pub user_code: String,
}

/// Where interactive sign-in prompts are shown (stdout, TUI popup, ...).
pub type PromptSink = Arc<dyn Fn(DevicePrompt) + Send + Sync>;

/// Prompt sink that prints to stdout (CLI mode).
pub fn stdout_prompt() -> PromptSink {
    Arc::new(|prompt: DevicePrompt| {
        println!();
        println!("To sign in, visit: {}", prompt.verification_url);
        println!("Enter code:        {}", prompt.user_code);
        println!();
    })
}

/// Operations the client needs from the identity service.
pub trait AuthProvider: Send + Sync {
    /// Receiver that observes every identity change. Dropping it unsubscribes.
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>>;

    /// Run the provider's interactive sign-in.
    fn sign_in(&self) -> BoxFuture<'_, Result<Identity, AuthError>>;

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>>;
}
