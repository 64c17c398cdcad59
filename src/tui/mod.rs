//! Terminal user interface using Ratatui.

mod app;
mod backend;
mod compose;
mod confirm;
mod debug_log;
mod help;
mod log_capture;
mod messages;
mod ui;

pub use app::{prompt_channel, run};
pub use log_capture::LogBuffer;
