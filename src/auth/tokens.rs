//! Token storage and management

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// Refresh this many seconds before the provider-reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Stored bearer token with its absolute expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: Option<i64>,
}

impl StoredToken {
    pub fn new(token: String, expires_in_secs: Option<u64>) -> Self {
        let expires_at = expires_in_secs.map(|secs| {
            let secs = i64::try_from(secs).unwrap_or(i64::MAX / 2);
            Utc::now().timestamp().saturating_add(secs)
        });
        Self { token, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map_or(false, |exp| Utc::now().timestamp() + EXPIRY_MARGIN_SECS >= exp)
    }
}

/// Signed-in Firebase session, persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub identity: Identity,
    pub id_token: StoredToken,
    pub refresh_token: String,
}

/// Persistence for the signed-in session.
pub trait SessionStore {
    fn get_session(&self) -> Option<StoredSession>;
    fn set_session(&mut self, session: StoredSession);
    fn clear_session(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_without_expiry_never_expires() {
        let token = StoredToken::new("t".to_string(), None);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_expiry_margin() {
        assert!(StoredToken::new("t".to_string(), Some(30)).is_expired());
        assert!(!StoredToken::new("t".to_string(), Some(3600)).is_expired());

        let stale = StoredToken {
            token: "t".to_string(),
            expires_at: Some(0),
        };
        assert!(stale.is_expired());
    }
}
