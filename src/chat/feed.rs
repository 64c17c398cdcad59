//! Live feed: one standing subscription turned into an ordered message list.

use std::cmp::Ordering;

use futures::StreamExt;

use crate::models::{Message, MessageId};
use crate::store::{FeedQuery, MessageStore, Snapshot, SnapshotStream};

/// Ordered view of the collection, replaced wholesale by each snapshot.
///
/// Mounting opens exactly one subscription; unmounting (or dropping) releases
/// it exactly once. `loading` is true until the first snapshot arrives and
/// never goes back.
#[derive(Debug)]
pub struct LiveFeed {
    subscription: Option<SnapshotStream>,
    messages: Vec<Message>,
    loading: bool,
}

impl LiveFeed {
    /// Open the subscription.
    pub fn mount(store: &dyn MessageStore, query: FeedQuery) -> Self {
        tracing::debug!("Mounting live feed (limit {:?})", query.limit);
        Self {
            subscription: Some(store.subscribe(query)),
            messages: Vec::new(),
            loading: true,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn find(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Replace the list with `snapshot`, ordered ascending by `createdAt`.
    pub fn apply(&mut self, snapshot: Snapshot) {
        let mut messages = snapshot.messages;
        sort_by_created_at(&mut messages);
        self.messages = messages;
        self.loading = false;
    }

    /// Wait for the next snapshot and apply it.
    ///
    /// Returns `false` when there is nothing to wait for: the feed is
    /// unmounted, or the subscription ended (it is then released).
    /// Cancel-safe: dropping the future loses no snapshot.
    pub async fn next_snapshot(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };

        match subscription.next().await {
            Some(snapshot) => {
                tracing::trace!("Feed snapshot with {} messages", snapshot.len());
                self.apply(snapshot);
                true
            }
            None => {
                tracing::warn!("Feed subscription ended unexpectedly");
                self.unmount();
                false
            }
        }
    }

    /// Release the subscription. Idempotent; the current list is kept.
    pub fn unmount(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
            tracing::debug!("Live feed unmounted");
        }
    }
}

/// Stable sort: ascending timestamp, unstamped records last, store order on ties.
pub fn sort_by_created_at(messages: &mut [Message]) {
    messages.sort_by(|a, b| match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::testing::{alice, bob, message, RecordingStore};

    fn ids(feed: &LiveFeed) -> Vec<&str> {
        feed.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_loading_flips_once() {
        let store = RecordingStore::new();
        let mut feed = LiveFeed::mount(&store, FeedQuery::all());
        assert!(feed.is_loading());

        store.push(vec![]);
        assert!(feed.next_snapshot().await);
        assert!(!feed.is_loading());

        store.push(vec![message("a", &alice(), "x", Some(1))]);
        assert!(feed.next_snapshot().await);
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn test_latest_snapshot_replaces_everything() {
        let store = RecordingStore::new();
        let mut feed = LiveFeed::mount(&store, FeedQuery::all());

        store.push(vec![
            message("a", &alice(), "first", Some(1)),
            message("b", &bob(), "second", Some(2)),
        ]);
        feed.next_snapshot().await;
        assert_eq!(ids(&feed), vec!["a", "b"]);

        // "a" deleted elsewhere, "c" added.
        store.push(vec![
            message("b", &bob(), "second", Some(2)),
            message("c", &alice(), "third", Some(3)),
        ]);
        feed.next_snapshot().await;
        assert_eq!(ids(&feed), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_snapshot_sorted_ascending_with_pending_last() {
        let store = RecordingStore::new();
        let mut feed = LiveFeed::mount(&store, FeedQuery::all());

        store.push(vec![
            message("pending", &alice(), "p", None),
            message("late", &alice(), "l", Some(40)),
            message("tie1", &bob(), "t1", Some(20)),
            message("early", &bob(), "e", Some(5)),
            message("tie2", &alice(), "t2", Some(20)),
        ]);
        feed.next_snapshot().await;
        assert_eq!(ids(&feed), vec!["early", "tie1", "tie2", "late", "pending"]);
    }

    #[tokio::test]
    async fn test_unmount_releases_exactly_once() {
        let store = RecordingStore::new();

        for cycle in 1..=3 {
            let mut feed = LiveFeed::mount(&store, FeedQuery::all());
            assert_eq!(store.subscribe_count(), cycle);
            feed.unmount();
            feed.unmount();
            assert!(!feed.is_mounted());
            drop(feed);
            assert_eq!(store.release_count(), cycle);
        }
    }

    #[tokio::test]
    async fn test_drop_without_unmount_releases() {
        let store = RecordingStore::new();
        {
            let _feed = LiveFeed::mount(&store, FeedQuery::all());
        }
        assert_eq!(store.subscribe_count(), 1);
        assert_eq!(store.release_count(), 1);
    }

    #[tokio::test]
    async fn test_unmounted_feed_keeps_list_and_stops_waiting() {
        let store = RecordingStore::new();
        let mut feed = LiveFeed::mount(&store, FeedQuery::all());
        store.push(vec![message("a", &alice(), "x", Some(1))]);
        feed.next_snapshot().await;

        feed.unmount();
        assert!(!feed.next_snapshot().await);
        assert_eq!(ids(&feed), vec!["a"]);
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_store() {
        let store = MemoryStore::new();
        let mut feed = LiveFeed::mount(&store, FeedQuery::all());
        feed.next_snapshot().await;
        assert!(feed.is_empty());

        let id = store
            .create(crate::models::NewMessage::from_identity(&alice(), "hello"))
            .await
            .unwrap();
        // Not visible until the subscription delivers it.
        assert!(feed.find(&id).is_none());

        feed.next_snapshot().await;
        assert_eq!(feed.find(&id).map(|m| m.text.as_str()), Some("hello"));

        feed.unmount();
        assert_eq!(store.active_subscriptions(), 0);
    }
}
