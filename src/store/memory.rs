//! In-process message store with live fan-out.
//!
//! Backs the `local` backend and the tests. Every mutation publishes the full
//! collection on a watch channel; each subscription maps it through its
//! window. Deletes are checked against the stored author.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{FeedQuery, MessageStore, Snapshot, SnapshotStream, StoreError};
use crate::models::{CreatedAt, Identity, Message, MessageId, NewMessage};

struct Inner {
    /// Ascending by `createdAt`, insertion order on ties.
    messages: Mutex<Vec<Message>>,
    published: watch::Sender<Arc<Vec<Message>>>,
    active_subscriptions: AtomicUsize,
}

/// Cheaply cloneable handle to a shared in-memory collection.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (published, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(Inner {
                messages: Mutex::new(Vec::new()),
                published,
                active_subscriptions: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of subscriptions opened and not yet released.
    pub fn active_subscriptions(&self) -> usize {
        self.inner.active_subscriptions.load(Ordering::SeqCst)
    }

    /// Current contents, ascending.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        // A panic while holding the lock leaves the Vec intact; keep serving it.
        self.inner.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, messages: &[Message]) {
        self.inner.published.send_replace(Arc::new(messages.to_vec()));
    }

    fn insert(&self, new: &NewMessage) -> MessageId {
        let id = MessageId::new(uuid::Uuid::new_v4().simple().to_string());
        let created_at = match new.created_at {
            CreatedAt::ServerTimestamp => Utc::now(),
            CreatedAt::Explicit(ts) => ts,
        };
        let message = Message::from_new(id.clone(), new, Some(created_at));

        let mut messages = self.lock();
        // Insert after every message with an equal or earlier timestamp.
        let pos = messages.partition_point(|m| m.created_at.map_or(true, |t| t <= created_at));
        messages.insert(pos, message);
        self.publish(&messages);
        id
    }

    fn remove(&self, id: &MessageId, actor: &Identity) -> Result<(), StoreError> {
        let mut messages = self.lock();
        let pos = messages
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if !messages[pos].is_authored_by(actor) {
            return Err(StoreError::PermissionDenied {
                id: id.clone(),
                actor: actor.uid.clone(),
            });
        }

        messages.remove(pos);
        self.publish(&messages);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for MemoryStore {
    fn subscribe(&self, query: FeedQuery) -> SnapshotStream {
        let rx = self.inner.published.subscribe();
        let open = self.inner.active_subscriptions.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Memory store subscription opened ({} active)", open);

        let inner = Arc::clone(&self.inner);
        let snapshots =
            WatchStream::new(rx).map(move |all| Snapshot::new(query.window(all.as_ref().clone())));

        SnapshotStream::new(snapshots, move || {
            let left = inner.active_subscriptions.fetch_sub(1, Ordering::SeqCst) - 1;
            tracing::debug!("Memory store subscription released ({} active)", left);
        })
    }

    fn create(&self, message: NewMessage) -> BoxFuture<'_, Result<MessageId, StoreError>> {
        async move {
            let id = self.insert(&message);
            tracing::debug!("Created message {}", id);
            Ok(id)
        }
        .boxed()
    }

    fn delete<'a>(
        &'a self,
        id: &'a MessageId,
        actor: &'a Identity,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            self.remove(id, actor)?;
            tracing::debug!("Deleted message {}", id);
            Ok(())
        }
        .boxed()
    }
}
