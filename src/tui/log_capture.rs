//! Tracing output capture for TUI mode.
//!
//! While the alternate screen is up, anything written to stderr would tear
//! the display. `LogBuffer` is a `MakeWriter` that collects formatted lines
//! into a bounded queue instead; the debug pane drains it every frame.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Lines held between drains. Older lines are dropped first.
const CAPACITY: usize = 500;

/// One formatted log line and the level parsed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Option<Level>,
    pub text: String,
}

impl LogLine {
    fn parse(text: String) -> Self {
        let level = [
            Level::ERROR,
            Level::WARN,
            Level::INFO,
            Level::DEBUG,
            Level::TRACE,
        ]
        .into_iter()
        .find(|level| {
            let name = level.as_str();
            text.split_whitespace().take(3).any(|word| word == name)
        });
        Self { level, text }
    }

    /// WARN or ERROR.
    pub fn is_problem(&self) -> bool {
        matches!(self.level, Some(Level::WARN) | Some(Level::ERROR))
    }
}

/// Shared, bounded queue of captured lines.
#[derive(Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<LogLine>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: String) {
        // A panic elsewhere must not stop logging.
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= CAPACITY {
            queue.pop_front();
        }
        queue.push_back(LogLine::parse(text));
    }

    /// Take everything captured so far, oldest first.
    pub fn drain(&self) -> Vec<LogLine> {
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }
}

/// Per-event writer: buffers bytes and hands over complete lines.
pub struct LineWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl LineWriter {
    fn take_complete_lines(&mut self) {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.buffer.push(text);
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.take_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push(text);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }
}
