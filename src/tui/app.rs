//! TUI application state and main event loop

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::debug_log::DebugLogState;
use super::log_capture::LogBuffer;
use super::messages::FeedViewState;
use super::ui;
use crate::auth::{DevicePrompt, PromptSink, Session};
use crate::chat::{ComposeState, DeleteRequest, LiveFeed};
use crate::context::ChatContext;

/// Redraw interval when nothing else happens (keeps the debug log live).
const TICK: Duration = Duration::from_millis(250);

/// Lines scrolled per PageUp/PageDown in the debug log.
const LOG_PAGE: usize = 5;

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Feed,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Feed => "feed",
            Pane::Compose => "compose",
        }
    }
}

/// Application state
pub struct App {
    pub should_exit: bool,
    pub session: Session,
    pub backend_name: &'static str,
    pub feed: LiveFeed,
    pub view: FeedViewState,
    pub compose: ComposeState,
    pub active_pane: Pane,
    /// Delete waiting for y/n.
    pub pending_delete: Option<DeleteRequest>,
    /// Device-code prompt of a sign-in in progress.
    pub sign_in_prompt: Option<DevicePrompt>,
    pub signing_in: bool,
    pub sending: bool,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub show_help: bool,
    pub debug_log: DebugLogState,
}

impl App {
    pub fn new(
        session: Session,
        feed: LiveFeed,
        debug_log: DebugLogState,
        backend_name: &'static str,
    ) -> Self {
        Self {
            should_exit: false,
            session,
            backend_name,
            feed,
            view: FeedViewState::default(),
            compose: ComposeState::default(),
            active_pane: Pane::Feed,
            pending_delete: None,
            sign_in_prompt: None,
            signing_in: false,
            sending: false,
            status_message: None,
            status_is_error: false,
            show_help: false,
            debug_log,
        }
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = false;
    }

    fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = true;
    }

    /// A new snapshot was applied to the feed.
    pub fn on_snapshot(&mut self) {
        self.view.sync(self.feed.len());
        // The message under a pending delete may have gone away.
        if let Some(request) = &self.pending_delete {
            if self.feed.find(request.message_id()).is_none() {
                if let Some(request) = self.pending_delete.take() {
                    request.cancel();
                }
            }
        }
    }

    /// The signed-in identity changed.
    ///
    /// The feed is left alone; only identity-dependent UI is updated.
    pub fn on_identity_change(&mut self) {
        let identity = self.session.current_identity();

        if let Some(request) = &self.pending_delete {
            if !request.still_permitted(identity.as_ref()) {
                if let Some(request) = self.pending_delete.take() {
                    request.cancel();
                }
            }
        }

        match identity {
            Some(identity) => self.set_status(format!("Signed in as {}", identity.label())),
            None => {
                if self.active_pane == Pane::Compose {
                    self.active_pane = Pane::Feed;
                }
                self.set_status("Signed out");
            }
        }
    }

    pub fn handle_response(&mut self, response: BackendResponse) {
        match response {
            BackendResponse::MessageSent(result) => {
                self.sending = false;
                self.compose.finish(&result);
                match result {
                    Ok(_) => {
                        self.view.follow = true;
                        self.status_message = None;
                    }
                    Err(e) => self.set_error(format!("Send failed: {}", e)),
                }
            }
            BackendResponse::MessageDeleted { id, result } => match result {
                Ok(()) => self.set_status(format!("Message {} deleted", id)),
                Err(e) => self.set_error(format!("Delete failed: {}", e)),
            },
            BackendResponse::SignedIn(result) => {
                self.signing_in = false;
                self.sign_in_prompt = None;
                if let Err(e) = result {
                    self.set_error(format!("Sign in failed: {}", e));
                }
            }
            BackendResponse::SignedOut(result) => {
                if let Err(e) = result {
                    self.set_error(format!("Sign out failed: {}", e));
                }
            }
        }
    }

    /// Handle a key press. Returns the backend work it triggers, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return None;
        }

        if self.pending_delete.is_some() {
            return self.handle_confirm_key(key);
        }

        if self.show_help {
            self.show_help = false;
            return None;
        }

        if self.sign_in_prompt.is_some() {
            if key.code == KeyCode::Esc {
                self.sign_in_prompt = None;
            }
            return None;
        }

        match key.code {
            KeyCode::Char('l') if ctrl => {
                self.debug_log.toggle();
                return None;
            }
            KeyCode::Char('e') if ctrl && self.debug_log.visible => {
                self.debug_log.toggle_filter();
                return None;
            }
            KeyCode::PageUp if self.debug_log.visible => {
                self.debug_log.scroll_up(LOG_PAGE);
                return None;
            }
            KeyCode::PageDown if self.debug_log.visible => {
                self.debug_log.scroll_down(LOG_PAGE);
                return None;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.switch_pane();
                return None;
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Feed => self.handle_feed_key(key),
            Pane::Compose => self.handle_compose_key(key),
        }
    }

    fn switch_pane(&mut self) {
        self.active_pane = match self.active_pane {
            Pane::Feed if self.session.is_signed_in() => Pane::Compose,
            Pane::Feed => {
                self.set_status("Sign in to send messages");
                Pane::Feed
            }
            Pane::Compose => Pane::Feed,
        };
    }

    fn handle_feed_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        let len = self.feed.len();
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Up | KeyCode::Char('k') => self.view.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.view.select_next(len),
            KeyCode::Home | KeyCode::Char('g') => self.view.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.view.select_last(len),
            KeyCode::Char('d') | KeyCode::Delete => self.open_delete(),
            KeyCode::Enter | KeyCode::Char('i') => self.switch_pane(),
            KeyCode::Char('s') => return self.request_sign_in(),
            KeyCode::Char('o') if self.session.is_signed_in() => {
                return Some(BackendCommand::SignOut);
            }
            _ => {}
        }
        None
    }

    fn handle_compose_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => self.active_pane = Pane::Feed,
            KeyCode::Enter if alt || shift => self.compose.insert_newline(),
            KeyCode::Enter => return self.submit(),
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Char(c) if !ctrl => self.compose.insert_char(c),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            _ => {}
        }
        None
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let request = self.pending_delete.take()?;
                self.set_status(format!("Deleting message {}...", request.message_id()));
                Some(BackendCommand::Delete(request))
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                if let Some(request) = self.pending_delete.take() {
                    request.cancel();
                }
                None
            }
            _ => None,
        }
    }

    fn open_delete(&mut self) {
        let Some(message) = self.feed.get(self.view.selected) else {
            return;
        };
        let identity = self.session.current_identity();
        match DeleteRequest::open(message, identity.as_ref()) {
            Some(request) => self.pending_delete = Some(request),
            None => self.set_error("Only the author can delete a message"),
        }
    }

    fn submit(&mut self) -> Option<BackendCommand> {
        if self.sending {
            return None;
        }
        let identity = self.session.current_identity();
        let request = self.compose.prepare(identity.as_ref())?;
        self.sending = true;
        Some(BackendCommand::Submit(request))
    }

    fn request_sign_in(&mut self) -> Option<BackendCommand> {
        if self.session.is_signed_in() || self.signing_in {
            return None;
        }
        self.signing_in = true;
        self.set_status("Signing in...");
        Some(BackendCommand::SignIn)
    }
}

/// Prompt sink that forwards device-code prompts to the running TUI.
pub fn prompt_channel() -> (PromptSink, mpsc::UnboundedReceiver<DevicePrompt>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: PromptSink = std::sync::Arc::new(move |prompt: DevicePrompt| {
        let _ = tx.send(prompt);
    });
    (sink, rx)
}

/// Run the TUI until the user quits.
///
/// `ratatui::init` installs a panic hook that restores the terminal.
pub async fn run(
    ctx: ChatContext,
    logs: LogBuffer,
    prompts: mpsc::UnboundedReceiver<DevicePrompt>,
) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, ctx, logs, prompts).await;
    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    ctx: ChatContext,
    logs: LogBuffer,
    mut prompts: mpsc::UnboundedReceiver<DevicePrompt>,
) -> Result<()> {
    let backend_name = match ctx.backend {
        crate::config::BackendKind::Firebase => "firebase",
        crate::config::BackendKind::Local => "local",
    };
    let feed = LiveFeed::mount(ctx.store.as_ref(), ctx.query);
    let mut app = App::new(
        ctx.session.clone(),
        feed,
        DebugLogState::new(logs),
        backend_name,
    );
    let mut backend = Backend::start(ctx.store.clone(), ctx.session.clone());
    let mut identity = ctx.session.watch();
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);

    while !app.should_exit {
        app.debug_log.refresh();
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(cmd) = app.handle_key(key) {
                        backend.send(cmd);
                    }
                }
                // Resize and the rest: redraw on the next pass.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("Terminal event error: {}", e);
                    app.should_exit = true;
                }
                None => app.should_exit = true,
            },
            more = app.feed.next_snapshot(), if app.feed.is_mounted() => {
                if more {
                    app.on_snapshot();
                } else {
                    app.set_error("Feed disconnected");
                }
            }
            Some(response) = backend.recv() => app.handle_response(response),
            Ok(()) = identity.changed() => app.on_identity_change(),
            Some(prompt) = prompts.recv() => app.sign_in_prompt = Some(prompt),
            _ = tick.tick() => {}
        }
    }

    app.feed.unmount();
    Ok(())
}
