//! Chat controllers: the live feed, the compose box and per-message deletes.
//!
//! These hold no terminal state; the TUI and the one-shot commands drive them.

pub mod compose;
pub mod feed;
pub mod item;

pub use compose::{ComposeState, SubmitOutcome};
pub use feed::LiveFeed;
pub use item::{can_delete, DeleteRequest};
