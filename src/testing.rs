//! Test doubles shared across unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::models::{Identity, Message, MessageId, NewMessage};
use crate::store::{FeedQuery, MessageStore, Snapshot, SnapshotStream, StoreError};

pub fn alice() -> Identity {
    Identity {
        uid: "u1".to_string(),
        display_name: Some("Alice".to_string()),
        email: Some("a@x.com".to_string()),
        photo_url: Some("p".to_string()),
    }
}

pub fn bob() -> Identity {
    Identity {
        uid: "u2".to_string(),
        display_name: Some("Bob".to_string()),
        email: Some("b@x.com".to_string()),
        photo_url: None,
    }
}

/// Message by `author` with a timestamp `minute` minutes past 10:00 UTC.
pub fn message(id: &str, author: &Identity, text: &str, minute: Option<u32>) -> Message {
    use chrono::TimeZone;
    let new = NewMessage::from_identity(author, text);
    let created_at =
        minute.map(|m| chrono::Utc.with_ymd_and_hms(2024, 1, 1, 10, m, 0).unwrap());
    Message::from_new(MessageId::new(id), &new, created_at)
}

/// Store that records every request and lets the test push snapshots.
#[derive(Default)]
pub struct RecordingStore {
    creates: Mutex<Vec<NewMessage>>,
    deletes: Mutex<Vec<MessageId>>,
    fail: AtomicBool,
    subscribed: AtomicUsize,
    released: Arc<AtomicUsize>,
    feeds: Mutex<Vec<mpsc::UnboundedSender<Snapshot>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make create and delete fail until switched back.
    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Deliver `messages` to every open subscription.
    pub fn push(&self, messages: Vec<Message>) {
        let feeds = self.feeds.lock().unwrap();
        for tx in feeds.iter() {
            let _ = tx.send(Snapshot::new(messages.clone()));
        }
    }

    pub fn creates(&self) -> Vec<NewMessage> {
        self.creates.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<MessageId> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribed.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Http {
                status: 503,
                url: "test://store".to_string(),
                body: "unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl MessageStore for RecordingStore {
    fn subscribe(&self, _query: FeedQuery) -> SnapshotStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().push(tx);
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        let released = Arc::clone(&self.released);
        SnapshotStream::new(UnboundedReceiverStream::new(rx), move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn create(&self, message: NewMessage) -> BoxFuture<'_, Result<MessageId, StoreError>> {
        async move {
            let mut creates = self.creates.lock().unwrap();
            creates.push(message);
            self.outcome()?;
            Ok(MessageId::new(format!("m{}", creates.len())))
        }
        .boxed()
    }

    fn delete<'a>(
        &'a self,
        id: &'a MessageId,
        _actor: &'a Identity,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            self.deletes.lock().unwrap().push(id.clone());
            self.outcome()
        }
        .boxed()
    }
}
