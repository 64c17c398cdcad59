//! Popups: delete confirmation and the device sign-in prompt.

use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::ui::centered_rect;
use crate::auth::DevicePrompt;
use crate::chat::DeleteRequest;

pub fn render_delete_popup(frame: &mut Frame, request: &DeleteRequest) {
    let area = frame.area();
    let popup_area = centered_rect(
        52.min(area.width.saturating_sub(2)),
        7.min(area.height.saturating_sub(2)),
        area,
    );
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(Span::styled(
            " Delete for everyone? ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));

    let lines = vec![
        Line::from(Span::styled(
            format!("\"{}\"", request.preview()),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("[y]", Style::default().fg(Color::Yellow)),
            Span::raw(" delete   "),
            Span::styled("[n]", Style::default().fg(Color::Yellow)),
            Span::raw(" keep"),
        ]),
    ];

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false }),
        popup_area,
    );
}

pub fn render_sign_in_popup(frame: &mut Frame, prompt: &DevicePrompt) {
    let area = frame.area();
    let popup_area = centered_rect(
        64.min(area.width.saturating_sub(2)),
        8.min(area.height.saturating_sub(2)),
        area,
    );
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " Sign in with Google ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Esc to hide ",
            Style::default().fg(Color::Gray),
        )));

    let lines = vec![
        Line::from("Open this page in a browser:"),
        Line::from(Span::styled(
            prompt.verification_url.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::UNDERLINED),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("and enter the code "),
            Span::styled(
                prompt.user_code.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false }),
        popup_area,
    );
}
