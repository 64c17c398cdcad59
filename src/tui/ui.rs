//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, Pane};
use super::compose;
use super::confirm;
use super::debug_log;
use super::help;
use super::messages;
use crate::models::Identity;

/// Status symbol and color for the signed-in state.
fn status_indicator(signed_in: bool) -> (&'static str, Color) {
    if signed_in {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let identity = app.session.current_identity();

    // header (1) + main + status bar (1)
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), identity.as_ref());

    let log_height = if app.debug_log.visible {
        debug_log::DEBUG_LOG_HEIGHT
    } else {
        0
    };
    let compose_height = if identity.is_some() {
        compose::COMPOSE_HEIGHT
    } else {
        3
    };
    let [feed_area, compose_area, log_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose_height),
        Constraint::Length(log_height),
    ])
    .areas(main_area);

    messages::render(
        feed_area,
        frame.buffer_mut(),
        &app.feed,
        &app.view,
        identity.as_ref(),
        app.active_pane == Pane::Feed,
    );

    if identity.is_some() {
        let focused = app.active_pane == Pane::Compose && !has_popup(app);
        compose::render(compose_area, frame, &app.compose, app.sending, focused);
    } else {
        compose::render_signed_out(compose_area, frame.buffer_mut(), app.signing_in);
    }

    if app.debug_log.visible {
        debug_log::render(log_area, frame.buffer_mut(), &app.debug_log);
    }

    render_status(status_area, frame.buffer_mut(), app);

    if let Some(request) = &app.pending_delete {
        confirm::render_delete_popup(frame, request);
    }
    if let Some(prompt) = &app.sign_in_prompt {
        confirm::render_sign_in_popup(frame, prompt);
    }
    if app.show_help {
        help::render_help_popup(frame);
    }
}

fn has_popup(app: &App) -> bool {
    app.pending_delete.is_some() || app.sign_in_prompt.is_some() || app.show_help
}

/// Return a centered sub-rect of the given size within `area`.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

fn render_header(area: Rect, buf: &mut Buffer, identity: Option<&Identity>) {
    let title = " Live Feed";
    let (symbol, color) = status_indicator(identity.is_some());
    let who = match identity {
        Some(identity) => match identity.email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) if identity.label() != email => {
                format!(" {} {} <{}> ", symbol, identity.label(), email)
            }
            _ => format!(" {} {} ", symbol, identity.label()),
        },
        None => format!(" {} signed out ", symbol),
    };
    let help = if identity.is_some() {
        " [o] Sign out  [?] Help "
    } else {
        " [s] Sign in  [?] Help "
    };

    let used = title.width() + help.width() + who.width();
    let padding = (area.width as usize).saturating_sub(used);

    let header_line = Line::from(vec![
        Span::styled(
            title,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(help, Style::default().fg(Color::Gray)),
        Span::styled(who, Style::default().fg(color)),
    ]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::Gray);
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.backend_name),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled("| ", sep_style),
        Span::styled(
            format!("{} messages ", app.feed.len()),
            Style::default().fg(Color::White),
        ),
        Span::styled("| ", sep_style),
        Span::styled(
            format!("Tab: {} ", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
    ];
    if !app.view.follow {
        spans.push(Span::styled("| ", sep_style));
        spans.push(Span::styled("G: newest ", Style::default().fg(Color::Gray)));
    }
    let problems = app.debug_log.unseen_problems();
    if problems > 0 {
        spans.push(Span::styled("| ", sep_style));
        spans.push(Span::styled(
            format!("{} warnings (C-l) ", problems),
            Style::default().fg(Color::Red),
        ));
    }
    spans.push(Span::styled("| ", sep_style));
    spans.push(Span::styled("?: help", Style::default().fg(Color::Gray)));

    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::local::LocalAuth;
    use crate::auth::Session;
    use crate::chat::LiveFeed;
    use crate::store::{FeedQuery, Snapshot};
    use crate::testing::{alice, message, RecordingStore};
    use crate::tui::debug_log::DebugLogState;
    use crate::tui::log_capture::LogBuffer;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buf = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                out.push_str(buf[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn app(signed_in: bool) -> App {
        let store = RecordingStore::new();
        let session = Session::new(Arc::new(LocalAuth::new(alice(), signed_in)));
        let mut feed = LiveFeed::mount(&store, FeedQuery::all());
        feed.apply(Snapshot::new(vec![message("m1", &alice(), "hello all", Some(1))]));
        App::new(session, feed, DebugLogState::new(LogBuffer::new()), "local")
    }

    #[test]
    fn test_signed_in_shows_compose_and_name() {
        let text = screen(&app(true));
        assert!(text.contains("Alice"));
        assert!(text.contains("Type a message..."));
        assert!(text.contains("stored unencrypted"));
        assert!(text.contains("<a@x.com>"));
        assert!(text.contains("[o] Sign out"));
        assert!(text.contains("hello all"));
    }

    #[test]
    fn test_signed_out_shows_sign_in_hint() {
        let text = screen(&app(false));
        assert!(text.contains("signed out"));
        assert!(text.contains("Sign in to send messages"));
        assert!(!text.contains("Type a message..."));
        // The feed is public.
        assert!(text.contains("hello all"));
    }

    #[test]
    fn test_delete_popup_rendered() {
        let mut app = app(true);
        app.pending_delete =
            crate::chat::DeleteRequest::open(&message("m1", &alice(), "hello all", Some(1)), Some(&alice()));
        let text = screen(&app);
        assert!(text.contains("Delete for everyone?"));
    }

    #[test]
    fn test_centered_rect() {
        let r = centered_rect(10, 4, Rect::new(0, 0, 30, 10));
        assert_eq!(r, Rect::new(10, 3, 10, 4));
    }
}
