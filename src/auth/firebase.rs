//! Firebase session exchange and the Firebase identity provider
//!
//! A Google ID token from the device flow is exchanged at the Identity
//! Toolkit for a Firebase session (uid, profile, ID token, refresh token).
//! ID tokens are refreshed lazily through the secure-token endpoint; a
//! refused refresh ends the session and publishes "signed out".

use std::path::PathBuf;

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{watch, Mutex};

use super::oauth::{self, GoogleClientConfig};
use super::{AuthError, AuthProvider, PromptSink, SessionStore, StoredSession, StoredToken};
use crate::config::Config;
use crate::models::Identity;

const SIGN_IN_WITH_IDP_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Response from `accounts:signInWithIdp`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    /// Seconds, sent as a string.
    expires_in: Option<String>,
}

/// Response from the secure-token refresh endpoint
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

fn parse_expires_in(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.parse().ok())
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    endpoint: &'static str,
) -> Result<T, AuthError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::Rejected {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }
    resp.json().await.map_err(|e| AuthError::Decode {
        endpoint,
        detail: e.to_string(),
    })
}

/// Exchange a Google ID token for a Firebase session.
pub async fn exchange_google_id_token(
    http: &reqwest::Client,
    api_key: &str,
    google_id_token: &str,
) -> Result<StoredSession, AuthError> {
    tracing::debug!("Exchanging Google ID token at {}", SIGN_IN_WITH_IDP_URL);

    let body = json!({
        "postBody": format!("id_token={}&providerId=google.com", google_id_token),
        "requestUri": "http://localhost",
        "returnSecureToken": true,
        "returnIdpCredential": false,
    });

    let resp = http
        .post(SIGN_IN_WITH_IDP_URL)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await
        .map_err(|source| AuthError::Transport {
            endpoint: SIGN_IN_WITH_IDP_URL,
            source,
        })?;

    let signed_in: SignInWithIdpResponse = read_json(resp, SIGN_IN_WITH_IDP_URL).await?;

    Ok(StoredSession {
        identity: Identity {
            uid: signed_in.local_id,
            display_name: signed_in.display_name,
            email: signed_in.email,
            photo_url: signed_in.photo_url,
        },
        id_token: StoredToken::new(
            signed_in.id_token,
            parse_expires_in(signed_in.expires_in.as_deref()),
        ),
        refresh_token: signed_in.refresh_token,
    })
}

/// Trade the refresh token for a fresh ID token.
///
/// A 400 from the endpoint means the refresh token is revoked or expired and
/// maps to [`AuthError::SessionExpired`].
pub async fn refresh_session(
    http: &reqwest::Client,
    api_key: &str,
    session: &StoredSession,
) -> Result<StoredSession, AuthError> {
    let resp = http
        .post(SECURE_TOKEN_URL)
        .query(&[("key", api_key)])
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", session.refresh_token.as_str()),
        ])
        .send()
        .await
        .map_err(|source| AuthError::Transport {
            endpoint: SECURE_TOKEN_URL,
            source,
        })?;

    let refreshed: RefreshResponse = match read_json(resp, SECURE_TOKEN_URL).await {
        Err(AuthError::Rejected { status: 400, body, .. }) => {
            tracing::warn!("Refresh token refused: {}", body);
            return Err(AuthError::SessionExpired);
        }
        other => other?,
    };

    Ok(StoredSession {
        identity: session.identity.clone(),
        id_token: StoredToken::new(
            refreshed.id_token,
            parse_expires_in(refreshed.expires_in.as_deref()),
        ),
        refresh_token: refreshed.refresh_token,
    })
}

/// Settings for the Firebase provider.
#[derive(Debug, Clone)]
pub struct FirebaseSettings {
    pub api_key: String,
    /// Needed for interactive sign-in only; a stored session works without it.
    pub google: Option<GoogleClientConfig>,
}

/// Firebase identity provider.
pub struct FirebaseAuth {
    http: reqwest::Client,
    settings: FirebaseSettings,
    session: Mutex<Option<StoredSession>>,
    identity: watch::Sender<Option<Identity>>,
    prompt: PromptSink,
    /// Config file that session changes are written back to.
    persist: Option<PathBuf>,
}

impl FirebaseAuth {
    /// Create the provider, restoring `stored` if present.
    pub fn new(
        settings: FirebaseSettings,
        stored: Option<StoredSession>,
        prompt: PromptSink,
    ) -> Self {
        let initial = stored.as_ref().map(|s| s.identity.clone());
        let (identity, _) = watch::channel(initial);
        Self {
            http: reqwest::Client::new(),
            settings,
            session: Mutex::new(stored),
            identity,
            prompt,
            persist: None,
        }
    }

    /// Persist session changes to the config file at `path`.
    pub fn persisting(mut self, path: PathBuf) -> Self {
        self.persist = Some(path);
        self
    }

    /// Current ID token, refreshed if it expired. `None` when signed out.
    pub async fn id_token(&self) -> Result<Option<String>, AuthError> {
        let mut guard = self.session.lock().await;
        let Some(current) = guard.as_ref() else {
            return Ok(None);
        };

        if !current.id_token.is_expired() {
            return Ok(Some(current.id_token.token.clone()));
        }

        tracing::info!("Firebase ID token expired, refreshing...");
        match refresh_session(&self.http, &self.settings.api_key, current).await {
            Ok(fresh) => {
                let token = fresh.id_token.token.clone();
                *guard = Some(fresh.clone());
                drop(guard);
                self.persist_session(Some(fresh)).await;
                tracing::info!("Firebase ID token refreshed");
                Ok(Some(token))
            }
            Err(AuthError::SessionExpired) => {
                *guard = None;
                drop(guard);
                self.identity.send_replace(None);
                self.persist_session(None).await;
                Err(AuthError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshot of the stored session (for `status`).
    pub async fn stored_session(&self) -> Option<StoredSession> {
        self.session.lock().await.clone()
    }

    async fn persist_session(&self, session: Option<StoredSession>) {
        let Some(path) = self.persist.clone() else {
            return;
        };
        let result = tokio::task::spawn_blocking(move || {
            let mut config = Config::load_from(&path)?;
            match session {
                Some(s) => config.set_session(s),
                None => config.clear_session(),
            }
            config.save_to(&path)
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to persist session: {:#}", e),
            Err(e) => tracing::warn!("Session write task failed: {}", e),
        }
    }

    async fn interactive_sign_in(&self) -> Result<Identity, AuthError> {
        let google = self
            .settings
            .google
            .as_ref()
            .ok_or(AuthError::NotConfigured("firebase.oauth_client_id"))?;

        let google_id_token = oauth::device_login(google, &self.prompt).await?;
        let session =
            exchange_google_id_token(&self.http, &self.settings.api_key, &google_id_token).await?;
        let identity = session.identity.clone();

        *self.session.lock().await = Some(session.clone());
        self.identity.send_replace(Some(identity.clone()));
        self.persist_session(Some(session)).await;

        tracing::info!("Signed in as {} ({})", identity.label(), identity.uid);
        Ok(identity)
    }

    async fn clear(&self) {
        *self.session.lock().await = None;
        self.identity.send_replace(None);
        self.persist_session(None).await;
    }
}

impl AuthProvider for FirebaseAuth {
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    fn sign_in(&self) -> BoxFuture<'_, Result<Identity, AuthError>> {
        self.interactive_sign_in().boxed()
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        async move {
            // Firebase ID tokens are stateless; signing out means forgetting them.
            self.clear().await;
            tracing::info!("Signed out");
            Ok(())
        }
        .boxed()
    }
}
