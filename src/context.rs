//! Wiring: builds the session and store for the selected backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::auth::firebase::{FirebaseAuth, FirebaseSettings};
use crate::auth::local::LocalAuth;
use crate::auth::{PromptSink, Session, SessionStore};
use crate::config::{BackendKind, Config};
use crate::store::firestore::{FirestoreSettings, FirestoreStore};
use crate::store::memory::MemoryStore;
use crate::store::{FeedQuery, MessageStore};

/// Everything a front end needs: who is signed in, where messages live, and
/// which slice of the feed to show.
#[derive(Clone)]
pub struct ChatContext {
    pub backend: BackendKind,
    pub session: Session,
    pub store: Arc<dyn MessageStore>,
    pub query: FeedQuery,
    /// Set for the Firebase backend (token status for `status`).
    pub firebase: Option<Arc<FirebaseAuth>>,
}

impl ChatContext {
    pub fn connect(config: &Config, backend: BackendKind, prompt: PromptSink) -> Result<Self> {
        let query = config.feed.query();
        match backend {
            BackendKind::Local => {
                let local = &config.local;
                tracing::debug!("Using local backend as {}", local.uid);
                let auth = LocalAuth::new(local.identity(), local.sign_in_on_start);
                Ok(Self {
                    backend,
                    session: Session::new(Arc::new(auth)),
                    store: Arc::new(MemoryStore::new()),
                    query,
                    firebase: None,
                })
            }
            BackendKind::Firebase => {
                let fb = &config.firebase;
                let project_id = fb
                    .project_id
                    .clone()
                    .context("firebase.project_id is not set in config.toml")?;
                let api_key = fb
                    .api_key
                    .clone()
                    .context("firebase.api_key is not set in config.toml")?;

                let auth = Arc::new(
                    FirebaseAuth::new(
                        FirebaseSettings {
                            api_key: api_key.clone(),
                            google: fb.google_client(),
                        },
                        config.get_session(),
                        prompt,
                    )
                    .persisting(Config::config_path()?),
                );
                let store = FirestoreStore::new(
                    FirestoreSettings {
                        project_id,
                        api_key,
                        collection: fb.collection.clone(),
                        poll_interval: Duration::from_millis(fb.poll_interval_ms.max(100)),
                    },
                    Arc::clone(&auth),
                );
                tracing::debug!(
                    "Using Firestore collection {} (poll {} ms)",
                    fb.collection,
                    fb.poll_interval_ms
                );

                Ok(Self {
                    backend,
                    session: Session::new(auth.clone()),
                    store: Arc::new(store),
                    query,
                    firebase: Some(auth),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::stdout_prompt;

    #[test]
    fn test_local_backend_starts_signed_in() {
        let config = Config::default();
        let ctx = ChatContext::connect(&config, BackendKind::Local, stdout_prompt()).unwrap();
        assert_eq!(ctx.session.current_identity().map(|i| i.uid), Some("local-user".to_string()));
        assert!(ctx.firebase.is_none());
    }

    #[test]
    fn test_firebase_backend_requires_project() {
        let config = Config::default();
        let err = ChatContext::connect(&config, BackendKind::Firebase, stdout_prompt())
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("project_id"));
    }

    #[test]
    fn test_firebase_backend_builds_signed_out() {
        let mut config = Config::default();
        config.firebase.project_id = Some("demo".to_string());
        config.firebase.api_key = Some("key".to_string());
        let ctx = ChatContext::connect(&config, BackendKind::Firebase, stdout_prompt()).unwrap();
        assert!(!ctx.session.is_signed_in());
        assert!(ctx.firebase.is_some());
    }
}
