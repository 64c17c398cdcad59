//! Compose box rendering, or the sign-in hint when nobody is signed in.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};

use crate::chat::ComposeState;

/// Height of the compose box including borders.
pub const COMPOSE_HEIGHT: u16 = 4;

/// Render the compose box: input line plus a key hint line.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, sending: bool, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(" Message ", Style::default().fg(Color::White)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let cursor = compute_cursor_position(input_area, state, focused);
    render_input(input_area, frame.buffer_mut(), state);
    if let Some((cx, cy)) = cursor {
        frame.set_cursor_position((cx, cy));
    }

    if inner.height >= 2 {
        let hint_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
        render_hints(hint_area, frame.buffer_mut(), sending, focused);
    }
}

/// Placeholder shown instead of the compose box while signed out.
pub fn render_signed_out(area: Rect, buf: &mut Buffer, signing_in: bool) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    block.render(area, buf);

    let text = if signing_in {
        " Signing in...".to_string()
    } else {
        " Sign in to send messages (press s)".to_string()
    };
    Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )))
    .render(inner, buf);
}

fn compute_cursor_position(
    input_area: Rect,
    state: &ComposeState,
    focused: bool,
) -> Option<(u16, u16)> {
    if !focused {
        return None;
    }

    let display = compose_display_text(state.text(), state.cursor(), input_area.width as usize);
    let cursor_x = input_area.x + 1 + display.cursor_offset as u16;
    Some((cursor_x, input_area.y))
}

fn render_input(area: Rect, buf: &mut Buffer, state: &ComposeState) {
    let w = area.width as usize;

    if state.text().is_empty() {
        let placeholder: String = " Type a message...".chars().take(w).collect();
        let line = Line::from(Span::styled(placeholder, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(area, buf);
    } else {
        let display = compose_display_text(state.text(), state.cursor(), w);
        let line = Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ));
        Paragraph::new(line).render(area, buf);
    }
}

fn render_hints(area: Rect, buf: &mut Buffer, sending: bool, focused: bool) {
    let line = if sending {
        Line::from(Span::styled(" Sending...", Style::default().fg(Color::Yellow)))
    } else if focused {
        Line::from(Span::styled(
            " Enter: send | Alt+Enter: newline | Esc: back to feed",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::styled(
            " Enter or i: write a message",
            Style::default().fg(Color::DarkGray),
        ))
    };
    Paragraph::new(line).render(area, buf);
}

/// Visible slice of the draft and where the cursor sits in it.
struct DisplayText {
    visible: String,
    cursor_offset: usize,
}

/// Flatten the draft to one display line, scrolled to keep the cursor visible.
///
/// Newlines show as a return symbol so the text length stays 1:1 with chars.
fn compose_display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    // One column of left margin.
    let avail = width.saturating_sub(2);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let flat: Vec<char> = input
        .chars()
        .map(|c| match c {
            '\n' => '\u{21B5}',
            '\t' => ' ',
            other => other,
        })
        .collect();
    let cursor = cursor_pos.min(flat.len());

    let start = if cursor < avail { 0 } else { cursor + 1 - avail };
    let end = (start + avail).min(flat.len());
    DisplayText {
        visible: flat[start..end].iter().collect(),
        cursor_offset: cursor - start,
    }
}
