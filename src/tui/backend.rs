//! Async backend: runs store and auth calls off the UI loop.
//!
//! The TUI sends `BackendCommand` values; each runs in its own tokio task and
//! reports back with a `BackendResponse`. The feed subscription does not go
//! through here, the app polls it directly.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::auth::{AuthError, Session};
use crate::chat::DeleteRequest;
use crate::models::{Identity, MessageId, NewMessage};
use crate::store::{MessageStore, StoreError};

/// Commands sent from the TUI event loop to the async backend.
#[derive(Debug, PartialEq)]
pub enum BackendCommand {
    Submit(NewMessage),
    Delete(DeleteRequest),
    SignIn,
    SignOut,
}

/// Responses from the async backend to the TUI.
#[derive(Debug)]
pub enum BackendResponse {
    MessageSent(Result<MessageId, StoreError>),
    MessageDeleted {
        id: MessageId,
        result: Result<(), StoreError>,
    },
    SignedIn(Result<Identity, AuthError>),
    SignedOut(Result<(), AuthError>),
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Spawn the command loop.
    pub fn start(store: Arc<dyn MessageStore>, session: Session) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(store, session, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Next response. `None` once the backend loop is gone.
    /// Cancel-safe, for use inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

async fn backend_loop(
    store: Arc<dyn MessageStore>,
    session: Session,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let store = Arc::clone(&store);
        let session = session.clone();
        let resp_tx = resp_tx.clone();

        // One task per command so a slow sign-in does not hold up sends.
        tokio::spawn(async move {
            let response = match cmd {
                BackendCommand::Submit(message) => {
                    BackendResponse::MessageSent(store.create(message).await)
                }
                BackendCommand::Delete(request) => {
                    let id = request.message_id().clone();
                    let result = request.confirm(store.as_ref()).await.map(|_| ());
                    BackendResponse::MessageDeleted { id, result }
                }
                BackendCommand::SignIn => BackendResponse::SignedIn(session.sign_in().await),
                BackendCommand::SignOut => BackendResponse::SignedOut(session.sign_out().await),
            };
            let _ = resp_tx.send(response);
        });
    }
}
