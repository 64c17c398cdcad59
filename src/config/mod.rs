//! Configuration and session storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::oauth::GoogleClientConfig;
use crate::auth::{SessionStore, StoredSession};
use crate::models::Identity;
use crate::store::{FeedQuery, DEFAULT_FEED_LIMIT};

/// Which store and identity provider to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Firestore collection plus Firebase auth
    #[default]
    Firebase,
    /// In-process store with a configured identity (offline)
    Local,
}

/// Firebase project settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    pub project_id: Option<String>,
    /// Web API key of the Firebase project
    pub api_key: Option<String>,
    /// Google OAuth client ("TVs and limited input" type) for device sign-in
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    /// Collection holding the chat messages
    pub collection: String,
    /// How often the listener polls for changes
    pub poll_interval_ms: u64,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            api_key: None,
            oauth_client_id: None,
            oauth_client_secret: None,
            collection: "messages".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

impl FirebaseConfig {
    /// Google client for interactive sign-in, if both halves are configured.
    pub fn google_client(&self) -> Option<GoogleClientConfig> {
        Some(GoogleClientConfig {
            client_id: self.oauth_client_id.clone()?,
            client_secret: self.oauth_client_secret.clone()?,
        })
    }
}

/// Feed window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Newest messages to keep in the feed; 0 shows the whole collection.
    pub limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_FEED_LIMIT,
        }
    }
}

impl FeedConfig {
    pub fn query(&self) -> FeedQuery {
        FeedQuery::from_limit(self.limit)
    }
}

/// Identity used by the local backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    /// Start signed in instead of waiting for an explicit sign-in
    pub sign_in_on_start: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            uid: "local-user".to_string(),
            display_name: Some("Local User".to_string()),
            email: None,
            photo_url: None,
            sign_in_on_start: true,
        }
    }
}

impl LocalConfig {
    pub fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub firebase: FirebaseConfig,
    pub feed: FeedConfig,
    pub local: LocalConfig,
    /// Signed-in Firebase session (written by `login`)
    pub session: Option<StoredSession>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "livefeed-chat", "livefeed-chat")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Session tokens live in this file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }
}

impl SessionStore for Config {
    fn get_session(&self) -> Option<StoredSession> {
        self.session.clone()
    }

    fn set_session(&mut self, session: StoredSession) {
        self.session = Some(session);
    }

    fn clear_session(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StoredToken;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("livefeed-chat-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend, BackendKind::Firebase);
        assert_eq!(config.firebase.collection, "messages");
        assert_eq!(config.firebase.poll_interval_ms, 1000);
        assert_eq!(config.feed.query(), FeedQuery::latest(DEFAULT_FEED_LIMIT));
        assert!(config.session.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            backend = "local"

            [firebase]
            project_id = "demo"

            [feed]
            limit = 0

            [local]
            uid = "u9"
            display_name = "Nine"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.firebase.project_id.as_deref(), Some("demo"));
        assert_eq!(config.firebase.collection, "messages");
        assert_eq!(config.feed.query(), FeedQuery::all());
        assert_eq!(config.local.identity().uid, "u9");
        assert!(config.local.sign_in_on_start);
    }

    #[test]
    fn test_google_client_needs_both_halves() {
        let mut firebase = FirebaseConfig {
            oauth_client_id: Some("id".to_string()),
            ..Default::default()
        };
        assert!(firebase.google_client().is_none());
        firebase.oauth_client_secret = Some("secret".to_string());
        assert_eq!(firebase.google_client().map(|g| g.client_id), Some("id".to_string()));
    }

    #[test]
    fn test_session_round_trips_through_file() {
        let path = temp_path("config.toml");
        let mut config = Config::default();
        config.set_session(StoredSession {
            identity: Identity {
                uid: "u1".to_string(),
                display_name: Some("Alice".to_string()),
                email: None,
                photo_url: None,
            },
            id_token: StoredToken {
                token: "id".to_string(),
                expires_at: Some(1_700_000_000),
            },
            refresh_token: "refresh".to_string(),
        });
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.get_session(), config.get_session());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let mut cleared = loaded;
        cleared.clear_session();
        assert!(cleared.get_session().is_none());

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load_from(&temp_path("absent.toml")).unwrap();
        assert_eq!(config.backend, BackendKind::Firebase);
    }
}
