//! Debug log pane: captured tracing output, toggled with Ctrl+L.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use tracing::Level;

use super::log_capture::{LogBuffer, LogLine};

/// Scrollback kept for display.
const MAX_LINES: usize = 1000;

/// Pane height when visible, borders included.
pub const DEBUG_LOG_HEIGHT: u16 = 10;

pub struct DebugLogState {
    buffer: LogBuffer,
    lines: Vec<LogLine>,
    pub visible: bool,
    /// Show only WARN and ERROR lines.
    pub problems_only: bool,
    /// Lines scrolled back from the newest (0 = pinned to the bottom).
    scroll_offset: usize,
    /// Problems logged while the pane was hidden.
    unseen_problems: usize,
}

impl DebugLogState {
    pub fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            lines: Vec::new(),
            visible: false,
            problems_only: false,
            scroll_offset: 0,
            unseen_problems: 0,
        }
    }

    /// Pull newly captured lines. Call once per frame.
    pub fn refresh(&mut self) {
        let fresh = self.buffer.drain();
        if fresh.is_empty() {
            return;
        }
        if !self.visible {
            self.unseen_problems += fresh.iter().filter(|l| l.is_problem()).count();
        }
        self.lines.extend(fresh);
        if self.lines.len() > MAX_LINES {
            let excess = self.lines.len() - MAX_LINES;
            self.lines.drain(..excess);
            self.scroll_offset = self.scroll_offset.saturating_sub(excess);
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.scroll_offset = 0;
            self.unseen_problems = 0;
        }
    }

    pub fn toggle_filter(&mut self) {
        self.problems_only = !self.problems_only;
        self.scroll_offset = 0;
    }

    pub fn unseen_problems(&self) -> usize {
        self.unseen_problems
    }

    pub fn scroll_up(&mut self, n: usize) {
        let max_offset = self.shown().count().saturating_sub(1);
        self.scroll_offset = self.scroll_offset.saturating_add(n).min(max_offset);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    fn shown(&self) -> impl Iterator<Item = &LogLine> {
        let problems_only = self.problems_only;
        self.lines
            .iter()
            .filter(move |l| !problems_only || l.is_problem())
    }
}

pub fn render(area: Rect, buf: &mut Buffer, state: &DebugLogState) {
    let title = if state.problems_only {
        " Debug Log (warnings+errors, Ctrl+E: all) "
    } else {
        " Debug Log (Ctrl+E: warnings+errors) "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let shown: Vec<&LogLine> = state.shown().collect();
    let end = shown.len().saturating_sub(state.scroll_offset);
    let start = end.saturating_sub(inner.height as usize);

    let lines: Vec<Line> = shown[start..end].iter().map(|l| colorize(l)).collect();
    Paragraph::new(lines).render(inner, buf);
}

fn colorize(line: &LogLine) -> Line<'static> {
    let color = match line.level {
        Some(Level::ERROR) => Color::Red,
        Some(Level::WARN) => Color::Yellow,
        Some(Level::INFO) => Color::Green,
        Some(_) => Color::DarkGray,
        None => Color::White,
    };
    Line::from(Span::styled(line.text.clone(), Style::default().fg(color)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(lines: &[&str]) -> (LogBuffer, DebugLogState) {
        let buffer = LogBuffer::new();
        for l in lines {
            buffer.push(l.to_string());
        }
        let state = DebugLogState::new(buffer.clone());
        (buffer, state)
    }

    #[test]
    fn test_unseen_problems_counted_while_hidden() {
        let (buffer, mut state) = state_with(&["x  WARN slow poll", "x  INFO ok"]);
        state.refresh();
        assert_eq!(state.unseen_problems(), 1);

        state.toggle();
        assert_eq!(state.unseen_problems(), 0);

        buffer.push("x ERROR boom".to_string());
        state.refresh();
        assert_eq!(state.unseen_problems(), 0);
    }

    #[test]
    fn test_filter_limits_scroll_range() {
        let (_buffer, mut state) =
            state_with(&["a  INFO 1", "b  WARN 2", "c  INFO 3", "d ERROR 4"]);
        state.refresh();

        state.scroll_up(100);
        assert_eq!(state.scroll_offset, 3);

        state.toggle_filter();
        assert_eq!(state.shown().count(), 2);
        state.scroll_up(100);
        assert_eq!(state.scroll_offset, 1);

        state.scroll_down(5);
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn test_scrollback_capped() {
        let (buffer, mut state) = state_with(&[]);
        for i in 0..MAX_LINES + 5 {
            buffer.push(format!("line {}", i));
            if i % 100 == 99 {
                state.refresh();
            }
        }
        state.refresh();
        assert_eq!(state.lines.len(), MAX_LINES);
        assert_eq!(state.lines[0].text, "line 5");
    }
}
