//! Data models for the chat feed

mod message;
mod user;

pub use message::*;
pub use user::*;
