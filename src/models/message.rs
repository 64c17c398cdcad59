//! Message-related models

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::Identity;

/// Display format for message timestamps (local time).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Store-assigned document key. Unique within the collection, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Chat message as delivered in a feed snapshot.
///
/// The author fields are a copy of the sender's profile at send time and are
/// not updated when the profile changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub author_uid: String,
    pub author_display_name: Option<String>,
    pub author_email: Option<String>,
    pub author_avatar_url: Option<String>,
    /// Body exactly as typed, whitespace included.
    pub text: String,
    /// `None` while the store has not stamped the record yet.
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Materialize a stored record from the fields it was created with.
    pub fn from_new(id: MessageId, new: &NewMessage, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id,
            author_uid: new.uid.clone(),
            author_display_name: new.author.clone(),
            author_email: new.mail.clone(),
            author_avatar_url: new.pfp.clone(),
            text: new.text.clone(),
            created_at,
        }
    }

    /// Whether `identity` wrote this message.
    pub fn is_authored_by(&self, identity: &Identity) -> bool {
        self.author_uid == identity.uid
    }

    /// Author label for display, falling back to email and then uid.
    pub fn author_label(&self) -> &str {
        self.author_display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.author_email.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.author_uid)
    }

    /// Single-character avatar stand-in (first letter of the author label).
    pub fn author_initial(&self) -> char {
        self.author_label()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }

    /// Local `YYYY-MM-DD HH:MM`, or `None` while the timestamp is pending.
    pub fn formatted_time(&self) -> Option<String> {
        self.created_at.map(|ts| {
            ts.with_timezone(&Local)
                .format(TIMESTAMP_FORMAT)
                .to_string()
        })
    }
}

/// Value of the `createdAt` field in a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedAt {
    /// Sentinel: the store stamps the record with its own clock on commit.
    ServerTimestamp,
    /// Explicit timestamp supplied by the writer.
    Explicit(DateTime<Utc>),
}

/// Fields of a create request, named as they are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub uid: String,
    pub text: String,
    pub author: Option<String>,
    pub pfp: Option<String>,
    pub mail: Option<String>,
    pub created_at: CreatedAt,
}

impl NewMessage {
    /// Build a create request for `text` sent by `identity`.
    ///
    /// `text` is kept untrimmed; validation is the caller's job.
    pub fn from_identity(identity: &Identity, text: impl Into<String>) -> Self {
        Self {
            uid: identity.uid.clone(),
            text: text.into(),
            author: identity.display_name.clone(),
            pfp: identity.photo_url.clone(),
            mail: identity.email.clone(),
            created_at: CreatedAt::ServerTimestamp,
        }
    }
}
