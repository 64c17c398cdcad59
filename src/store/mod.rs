//! Message store collaborator
//!
//! The store owns persistence and fan-out. The client consumes three
//! operations: a live, ordered snapshot stream; create; delete. Two backends
//! implement them: an in-process store (`memory`) and Firestore over REST
//! (`firestore`).

pub mod firestore;
pub mod memory;

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::auth::AuthError;
use crate::models::{Identity, Message, MessageId, NewMessage};

/// Default feed window: the newest 200 messages.
pub const DEFAULT_FEED_LIMIT: usize = 200;

/// Errors returned by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("{actor} is not allowed to delete message {id}")]
    PermissionDenied { id: MessageId, actor: String },

    #[error("message {0} not found")]
    NotFound(MessageId),

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("malformed store response: {0}")]
    Decode(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Which slice of the ordered collection a subscription delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    /// Keep only the newest `limit` messages. `None` means the whole collection.
    pub limit: Option<usize>,
}

impl FeedQuery {
    pub fn all() -> Self {
        Self { limit: None }
    }

    pub fn latest(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }

    /// Window from a user-supplied limit, where 0 means the whole collection.
    pub fn from_limit(limit: usize) -> Self {
        match limit {
            0 => Self::all(),
            n => Self::latest(n),
        }
    }

    /// Trim an ascending list down to the window, keeping the newest entries.
    pub fn window(&self, mut messages: Vec<Message>) -> Vec<Message> {
        if let Some(limit) = self.limit {
            if messages.len() > limit {
                messages.drain(..messages.len() - limit);
            }
        }
        messages
    }
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self::latest(DEFAULT_FEED_LIMIT)
    }
}

/// Full, ordered representation of the collection at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub messages: Vec<Message>,
}

impl Snapshot {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Standing subscription to the ordered collection.
///
/// Yields a full snapshot on every change and never ends on its own. The
/// release hook runs exactly once: on [`SnapshotStream::release`] or on drop,
/// whichever comes first. Subscribing again starts a fresh sequence.
pub struct SnapshotStream {
    inner: BoxStream<'static, Snapshot>,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl SnapshotStream {
    pub fn new<S, F>(inner: S, on_release: F) -> Self
    where
        S: Stream<Item = Snapshot> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            on_release: Some(Box::new(on_release)),
        }
    }

    /// Release the subscription now.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl Stream for SnapshotStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("released", &self.on_release.is_none())
            .finish()
    }
}

/// Operations the client needs from the document store.
pub trait MessageStore: Send + Sync {
    /// Open a standing subscription to the collection, ascending by `createdAt`.
    fn subscribe(&self, query: FeedQuery) -> SnapshotStream;

    /// Append a message. Returns the store-assigned id.
    fn create(&self, message: NewMessage) -> BoxFuture<'_, Result<MessageId, StoreError>>;

    /// Remove a message on behalf of `actor`.
    fn delete<'a>(
        &'a self,
        id: &'a MessageId,
        actor: &'a Identity,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn msg(id: &str) -> Message {
        Message {
            id: MessageId::new(id),
            author_uid: "u1".to_string(),
            author_display_name: None,
            author_email: None,
            author_avatar_url: None,
            text: id.to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_window_keeps_newest() {
        let all: Vec<Message> = ["a", "b", "c", "d"].iter().map(|id| msg(id)).collect();

        let windowed = FeedQuery::latest(2).window(all.clone());
        let ids: Vec<&str> = windowed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);

        assert_eq!(FeedQuery::all().window(all.clone()).len(), 4);
        assert_eq!(FeedQuery::latest(10).window(all).len(), 4);
    }

    #[test]
    fn test_zero_limit_means_everything() {
        let all: Vec<Message> = ["a", "b", "c"].iter().map(|id| msg(id)).collect();
        assert_eq!(FeedQuery::from_limit(0), FeedQuery::all());
        assert_eq!(FeedQuery::from_limit(0).window(all.clone()).len(), 3);
        assert_eq!(FeedQuery::from_limit(2).window(all).len(), 2);
    }

    #[test]
    fn test_release_runs_once_explicit_then_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let stream = SnapshotStream::new(futures::stream::pending(), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        stream.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_runs_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        {
            let _stream = SnapshotStream::new(futures::stream::pending(), move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_forwards_snapshots() {
        let inner = futures::stream::iter(vec![
            Snapshot::new(vec![msg("a")]),
            Snapshot::new(vec![msg("a"), msg("b")]),
        ]);
        let mut stream = SnapshotStream::new(inner, || {});
        assert_eq!(stream.next().await.map(|s| s.len()), Some(1));
        assert_eq!(stream.next().await.map(|s| s.len()), Some(2));
        assert!(stream.next().await.is_none());
    }
}
