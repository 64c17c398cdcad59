//! Feed pane: the live message list with selection and auto-follow.

use std::cell::Cell;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::chat::{can_delete, LiveFeed};
use crate::models::{Identity, Message};

/// Columns reserved left of message text (avatar initial plus gap).
const TEXT_INDENT: usize = 4;

/// Selection state for the feed pane.
///
/// `follow` keeps the selection pinned to the newest message as snapshots
/// arrive; moving up releases it, jumping to the bottom re-engages it.
pub struct FeedViewState {
    pub selected: usize,
    pub follow: bool,
    /// Last scroll position, kept between frames.
    scroll_offset: Cell<usize>,
}

impl Default for FeedViewState {
    fn default() -> Self {
        Self {
            selected: 0,
            follow: true,
            scroll_offset: Cell::new(0),
        }
    }
}

impl FeedViewState {
    /// Re-clamp after the list changed.
    pub fn sync(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.follow || self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.follow = false;
        }
    }

    pub fn select_next(&mut self, len: usize) {
        if self.selected + 1 < len {
            self.selected += 1;
        }
        self.follow = self.selected + 1 >= len;
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
        self.follow = false;
    }

    pub fn select_last(&mut self, len: usize) {
        self.selected = len.saturating_sub(1);
        self.follow = true;
    }
}

/// Render the feed pane into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    feed: &LiveFeed,
    view: &FeedViewState,
    viewer: Option<&Identity>,
    focused: bool,
) {
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
        .title(Span::styled(
            format!(" Feed ({}) ", feed.len()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Messages are visible to everyone and stored unencrypted ",
            Style::default().fg(Color::DarkGray),
        )));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if feed.is_loading() {
        render_placeholder(inner, buf, "Loading messages...");
        return;
    }
    if feed.is_empty() {
        render_placeholder(inner, buf, "No messages yet. Say hello!");
        return;
    }

    let (all_lines, msg_line_ranges) =
        build_message_lines(feed.messages(), view.selected, viewer, inner.width as usize);
    let total_lines = all_lines.len();
    let visible_height = inner.height as usize;

    let scroll = compute_auto_scroll(
        view.scroll_offset.get(),
        view.selected,
        &msg_line_ranges,
        visible_height,
        total_lines,
    );
    view.scroll_offset.set(scroll);

    for (row, line) in all_lines.iter().skip(scroll).take(visible_height).enumerate() {
        let line_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        Paragraph::new(line.clone()).render(line_area, buf);
    }

    if total_lines > visible_height {
        let indicator_x = inner.x + inner.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(indicator_x, inner.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if scroll + visible_height < total_lines {
            let bottom_y = inner.y + inner.height.saturating_sub(1);
            let cell = &mut buf[(indicator_x, bottom_y)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

fn render_placeholder(area: Rect, buf: &mut Buffer, text: &str) {
    let line = Line::from(Span::styled(
        format!(" {}", text),
        Style::default().fg(Color::DarkGray),
    ));
    Paragraph::new(line).render(area, buf);
}

/// Flat line buffer plus the line range each message occupies.
fn build_message_lines(
    messages: &[Message],
    selected: usize,
    viewer: Option<&Identity>,
    width: usize,
) -> (Vec<Line<'static>>, Vec<(usize, usize)>) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for (idx, msg) in messages.iter().enumerate() {
        let start = lines.len();
        let own = viewer.is_some_and(|v| msg.is_authored_by(v));
        let is_selected = idx == selected;

        push_message(&mut lines, msg, width, own, is_selected);

        if is_selected && can_delete(msg, viewer) {
            lines.push(align(
                vec![Span::styled(
                    "[d] delete".to_string(),
                    Style::default().fg(Color::Red).add_modifier(Modifier::DIM),
                )],
                width,
                own,
            ));
        }

        lines.push(Line::from(""));
        ranges.push((start, lines.len()));
    }

    (lines, ranges)
}

fn push_message(
    lines: &mut Vec<Line<'static>>,
    msg: &Message,
    width: usize,
    own: bool,
    is_selected: bool,
) {
    let marker_style = if is_selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let author_style = if own {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    // Blank until the store stamps the record.
    let time = msg.formatted_time().unwrap_or_default();

    let mut header = vec![
        Span::styled(format!("[{}]", msg.author_initial()), marker_style),
        Span::raw(" "),
        Span::styled(msg.author_label().to_string(), author_style),
    ];
    if is_selected {
        if let Some(email) = msg.author_email.as_deref().filter(|e| !e.is_empty()) {
            header.push(Span::styled(
                format!(" <{}>", email),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    header.push(Span::raw("  "));
    header.push(Span::styled(time, Style::default().fg(Color::DarkGray)));
    lines.push(align(header, width, own));

    let text_style = if is_selected {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::Gray)
    };
    let text_width = width.saturating_sub(TEXT_INDENT);
    for row in wrap_preserving(&msg.text, text_width) {
        let spans = if own {
            vec![Span::styled(row, text_style)]
        } else {
            vec![
                Span::raw(" ".repeat(TEXT_INDENT)),
                Span::styled(row, text_style),
            ]
        };
        lines.push(align(spans, width, own));
    }
}

/// Right-align `spans` within `width` for the viewer's own messages.
fn align(spans: Vec<Span<'static>>, width: usize, right: bool) -> Line<'static> {
    if !right {
        return Line::from(spans);
    }
    let used: usize = spans.iter().map(|s| s.content.width()).sum();
    // Keep the last column free for the scroll indicator.
    let pad = width.saturating_sub(used + 1);
    let mut padded = Vec::with_capacity(spans.len() + 1);
    padded.push(Span::raw(" ".repeat(pad)));
    padded.extend(spans);
    Line::from(padded)
}

/// Wrap to `max_width` columns without collapsing whitespace.
///
/// Explicit newlines always break. Long lines break after the last space that
/// fits, or mid-word when there is none.
fn wrap_preserving(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for raw in text.split('\n') {
        let line = raw.replace('\t', "    ");
        let mut current = String::new();
        let mut current_w = 0;
        for ch in line.chars() {
            let w = ch.width().unwrap_or(0);
            if current_w + w > max_width && !current.is_empty() {
                match current.rfind(' ').filter(|&pos| pos > 0) {
                    Some(pos) => {
                        let rest = current.split_off(pos + 1);
                        result.push(current);
                        current_w = rest.width();
                        current = rest;
                    }
                    None => {
                        result.push(std::mem::take(&mut current));
                        current_w = 0;
                    }
                }
            }
            current.push(ch);
            current_w += w;
        }
        result.push(current);
    }
    result
}

/// Compute scroll offset that keeps the selected message visible.
fn compute_auto_scroll(
    current_scroll: usize,
    selected: usize,
    ranges: &[(usize, usize)],
    visible_height: usize,
    total_lines: usize,
) -> usize {
    if ranges.is_empty() || total_lines <= visible_height {
        return 0;
    }

    let Some(&(sel_start, sel_end)) = ranges.get(selected) else {
        return current_scroll.min(total_lines.saturating_sub(visible_height));
    };

    let mut scroll = current_scroll;

    let msg_height = sel_end.saturating_sub(sel_start);
    if msg_height >= visible_height {
        scroll = sel_start;
    } else {
        if sel_start < scroll {
            scroll = sel_start;
        }
        if sel_end > scroll + visible_height {
            scroll = sel_end.saturating_sub(visible_height);
        }
    }

    let max_scroll = total_lines.saturating_sub(visible_height);
    scroll.min(max_scroll)
}
