//! Compose controller: draft editing and submission.

use crate::models::{Identity, MessageId, NewMessage};
use crate::store::{MessageStore, StoreError};

/// Result of a submit attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Create request accepted; the draft was cleared.
    Sent(MessageId),
    /// Nothing sent: blank draft or no identity. Draft untouched.
    Ignored,
}

/// Draft text with a character cursor.
#[derive(Debug, Default)]
pub struct ComposeState {
    input: String,
    /// Character offset into `input`.
    cursor_pos: usize,
}

impl ComposeState {
    pub fn text(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor_pos
    }

    pub fn is_blank(&self) -> bool {
        self.input.trim().is_empty()
    }

    /// Replace the draft and put the cursor at the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.input = text.into();
        self.cursor_pos = self.input.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let end = self.char_to_byte(self.cursor_pos);
            let start = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(start..end);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            let start = self.char_to_byte(self.cursor_pos);
            let end = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(start..end);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Build the create request for the current draft.
    ///
    /// `None` when the draft is blank after trimming or nobody is signed in.
    /// The request carries the draft untrimmed.
    pub fn prepare(&self, identity: Option<&Identity>) -> Option<NewMessage> {
        if self.is_blank() {
            return None;
        }
        let identity = identity?;
        Some(NewMessage::from_identity(identity, self.input.clone()))
    }

    /// Apply the outcome of a create request issued from `prepare`.
    ///
    /// Success clears the draft; failure keeps it for a manual retry.
    pub fn finish(&mut self, result: &Result<MessageId, StoreError>) {
        match result {
            Ok(id) => {
                tracing::debug!("Message {} sent", id);
                self.clear();
            }
            Err(e) => {
                tracing::error!("Send failed: {}", e);
            }
        }
    }

    /// Prepare, send and finish in one step.
    pub async fn submit(
        &mut self,
        identity: Option<&Identity>,
        store: &dyn MessageStore,
    ) -> Result<SubmitOutcome, StoreError> {
        let Some(request) = self.prepare(identity) else {
            return Ok(SubmitOutcome::Ignored);
        };

        let result = store.create(request).await;
        self.finish(&result);
        result.map(SubmitOutcome::Sent)
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreatedAt;
    use crate::testing::{alice, RecordingStore};

    fn draft(text: &str) -> ComposeState {
        let mut state = ComposeState::default();
        state.set_text(text);
        state
    }

    #[tokio::test]
    async fn test_blank_draft_is_ignored() {
        let store = RecordingStore::new();
        for text in ["", "   ", "\n\t "] {
            let mut state = draft(text);
            let outcome = state.submit(Some(&alice()), &store).await.unwrap();
            assert_eq!(outcome, SubmitOutcome::Ignored);
            assert_eq!(state.text(), text);
        }
        assert!(store.creates().is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_identity_is_ignored() {
        let store = RecordingStore::new();
        let mut state = draft("hello");
        let outcome = state.submit(None, &store).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored);
        assert_eq!(state.text(), "hello");
        assert!(store.creates().is_empty());
    }

    #[tokio::test]
    async fn test_submit_sends_profile_fields_and_clears() {
        let store = RecordingStore::new();
        let mut state = draft("hello");

        let outcome = state.submit(Some(&alice()), &store).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Sent(_)));

        let creates = store.creates();
        assert_eq!(creates.len(), 1);
        assert_eq!(
            creates[0],
            NewMessage {
                uid: "u1".to_string(),
                text: "hello".to_string(),
                author: Some("Alice".to_string()),
                pfp: Some("p".to_string()),
                mail: Some("a@x.com".to_string()),
                created_at: CreatedAt::ServerTimestamp,
            }
        );
        assert_eq!(state.text(), "");
        assert_eq!(state.cursor(), 0);
    }

    #[tokio::test]
    async fn test_text_sent_untrimmed() {
        let store = RecordingStore::new();
        let mut state = draft("  indented\n  code ");
        state.submit(Some(&alice()), &store).await.unwrap();
        assert_eq!(store.creates()[0].text, "  indented\n  code ");
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_draft() {
        let store = RecordingStore::new();
        store.fail_requests(true);
        let mut state = draft("hello");

        let err = state.submit(Some(&alice()), &store).await.unwrap_err();
        assert!(matches!(err, StoreError::Http { status: 503, .. }));
        assert_eq!(state.text(), "hello");
        assert_eq!(store.creates().len(), 1);

        store.fail_requests(false);
        state.submit(Some(&alice()), &store).await.unwrap();
        assert_eq!(state.text(), "");
        assert_eq!(store.creates().len(), 2);
    }

    #[test]
    fn test_cursor_editing_multibyte() {
        let mut state = ComposeState::default();
        for c in "héllo".chars() {
            state.insert_char(c);
        }
        state.move_left();
        state.move_left();
        state.backspace();
        assert_eq!(state.text(), "hélo");

        state.move_home();
        state.delete();
        assert_eq!(state.text(), "élo");

        state.move_end();
        state.insert_newline();
        state.insert_char('!');
        assert_eq!(state.text(), "élo\n!");
        assert_eq!(state.cursor(), 5);

        state.move_right();
        assert_eq!(state.cursor(), 5);
    }
}
