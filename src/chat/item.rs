//! Per-message delete affordance and confirmation.

use crate::models::{Identity, Message, MessageId};
use crate::store::{MessageStore, StoreError};

/// Characters of message text shown in the confirmation prompt.
const PREVIEW_CHARS: usize = 60;

/// Whether `viewer` may delete `message`: only its author, and only while
/// signed in.
pub fn can_delete(message: &Message, viewer: Option<&Identity>) -> bool {
    viewer.is_some_and(|identity| message.is_authored_by(identity))
}

/// A delete that is waiting for the user to confirm it.
///
/// Opening one sends nothing. `confirm` sends exactly one delete request;
/// `cancel` (or dropping) sends none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    id: MessageId,
    actor: Identity,
    preview: String,
}

impl DeleteRequest {
    /// `None` when `viewer` has no delete affordance on `message`.
    pub fn open(message: &Message, viewer: Option<&Identity>) -> Option<Self> {
        if !can_delete(message, viewer) {
            return None;
        }
        let actor = viewer?.clone();
        Some(Self {
            id: message.id.clone(),
            actor,
            preview: preview(&message.text),
        })
    }

    pub fn message_id(&self) -> &MessageId {
        &self.id
    }

    pub fn actor(&self) -> &Identity {
        &self.actor
    }

    /// First line of the message, shortened for the prompt.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Whether the identity that opened this request is still the one signed in.
    pub fn still_permitted(&self, current: Option<&Identity>) -> bool {
        current.is_some_and(|identity| identity.uid == self.actor.uid)
    }

    pub fn cancel(self) {
        tracing::debug!("Delete of {} cancelled", self.id);
    }

    /// Send the delete. Returns the id that was removed.
    pub async fn confirm(self, store: &dyn MessageStore) -> Result<MessageId, StoreError> {
        tracing::info!("Deleting message {}", self.id);
        match store.delete(&self.id, &self.actor).await {
            Ok(()) => Ok(self.id),
            Err(e) => {
                tracing::error!("Delete of {} failed: {}", self.id, e);
                Err(e)
            }
        }
    }
}

fn preview(text: &str) -> String {
    let line = text.trim().lines().next().unwrap_or("");
    let mut out: String = line.chars().take(PREVIEW_CHARS).collect();
    if line.chars().count() > PREVIEW_CHARS || text.trim().lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{alice, bob, message, RecordingStore};

    #[test]
    fn test_affordance_only_for_author() {
        let msg = message("m1", &alice(), "hi", Some(1));
        assert!(can_delete(&msg, Some(&alice())));
        assert!(!can_delete(&msg, Some(&bob())));
        assert!(!can_delete(&msg, None));

        assert!(DeleteRequest::open(&msg, Some(&bob())).is_none());
        assert!(DeleteRequest::open(&msg, None).is_none());
    }

    #[tokio::test]
    async fn test_confirm_sends_one_delete() {
        let store = RecordingStore::new();
        let msg = message("m1", &alice(), "hi", Some(1));

        let request = DeleteRequest::open(&msg, Some(&alice())).unwrap();
        assert!(store.deletes().is_empty());

        let removed = request.confirm(&store).await.unwrap();
        assert_eq!(removed, MessageId::new("m1"));
        assert_eq!(store.deletes(), vec![MessageId::new("m1")]);
    }

    #[tokio::test]
    async fn test_cancel_sends_nothing() {
        let store = RecordingStore::new();
        let msg = message("m1", &alice(), "hi", Some(1));

        DeleteRequest::open(&msg, Some(&alice())).unwrap().cancel();
        assert!(store.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_is_reported() {
        let store = RecordingStore::new();
        store.fail_requests(true);
        let msg = message("m1", &alice(), "hi", Some(1));

        let err = DeleteRequest::open(&msg, Some(&alice()))
            .unwrap()
            .confirm(&store)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Http { status: 503, .. }));
        assert_eq!(store.deletes().len(), 1);
    }

    #[test]
    fn test_still_permitted_tracks_identity() {
        let msg = message("m1", &alice(), "hi", Some(1));
        let request = DeleteRequest::open(&msg, Some(&alice())).unwrap();
        assert!(request.still_permitted(Some(&alice())));
        assert!(!request.still_permitted(Some(&bob())));
        assert!(!request.still_permitted(None));
    }

    #[test]
    fn test_preview_shortens() {
        let long = "x".repeat(100);
        let msg = message("m1", &alice(), &long, Some(1));
        let request = DeleteRequest::open(&msg, Some(&alice())).unwrap();
        assert_eq!(request.preview().chars().count(), PREVIEW_CHARS + 3);

        let multi = message("m2", &alice(), "  first\nsecond", Some(1));
        let request = DeleteRequest::open(&multi, Some(&alice())).unwrap();
        assert_eq!(request.preview(), "first...");
    }
}
