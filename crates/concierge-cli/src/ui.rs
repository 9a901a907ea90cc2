//! TUI implementation for concierge

use tokio::sync::mpsc;

use concierge_agent::{Error as AgentError, Role, SessionEvent, SubmitOutcome};
use concierge_ai::Model;
use concierge_tui::{
    Theme,
    input::Action,
    widgets::{
        InputBox, MessageList, Spinner,
        message_list::{ChatMessage, calculate_message_height},
    },
};
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use std::time::Instant;

use crate::App;
use crate::utils::truncate_chars;

/// Messages sent from the UI to the session driver
#[derive(Debug, PartialEq, Eq)]
pub enum UiMessage {
    /// User submitted a question
    Submit(String),
    /// Slash command
    Command(String),
    /// User requested quit
    Quit,
}

/// TUI application state
pub struct TuiState {
    /// Scrollback entries
    messages: Vec<ChatMessage>,
    /// Input box (the not-yet-submitted text)
    input: InputBox,
    /// Current scroll position
    scroll: usize,
    /// Whether a reply is pending
    is_processing: bool,
    /// Current status message
    status: String,
    theme: Theme,
    model: Model,
    /// Channel to the session driver
    ui_tx: mpsc::Sender<UiMessage>,
    /// Spinner start time for animation
    spinner_start: Instant,
    /// Persistent startup warning, e.g. customer records offline
    warning: Option<String>,
}

impl TuiState {
    pub fn new(model: Model, theme: Theme, ui_tx: mpsc::Sender<UiMessage>) -> Self {
        let mut input = InputBox::new().with_placeholder("Ask a question, or /help for commands");
        input.set_focused(true);

        Self {
            messages: vec![],
            input,
            scroll: 0,
            is_processing: false,
            status: "Ready".to_string(),
            theme,
            model,
            ui_tx,
            spinner_start: Instant::now(),
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }

    /// Mirror a session event into the scrollback
    pub fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::TurnAppended { turn, .. } => {
                let message = match turn.role() {
                    Role::User => ChatMessage::user(turn.content()),
                    Role::Assistant => {
                        ChatMessage::assistant(turn.content()).with_error(turn.is_error())
                    }
                };
                match self.messages.last_mut() {
                    Some(last) if last.is_streaming && turn.role() == Role::Assistant => {
                        *last = message;
                    }
                    _ => self.messages.push(message),
                }
                self.scroll_to_bottom();
            }
            SessionEvent::ReplyStart => {
                self.is_processing = true;
                self.spinner_start = Instant::now();
                self.status = "Waiting for reply...".to_string();
                self.messages.push(ChatMessage::assistant_streaming(""));
                self.scroll_to_bottom();
            }
            SessionEvent::ReplyDelta { delta } => {
                if let Some(last) = self.messages.last_mut() {
                    if last.is_streaming {
                        last.content.push_str(&delta);
                        self.scroll_to_bottom();
                    }
                }
            }
            SessionEvent::ReplyEnd { .. } => {
                self.status = "Ready".to_string();
            }
            SessionEvent::Error { message } => {
                // The placeholder never becomes a turn; an error turn may follow.
                if self.messages.last().is_some_and(|m| m.is_streaming) {
                    self.messages.pop();
                }
                self.status = format!("Error: {}", truncate_chars(&message, 80));
            }
        }
    }

    /// Called once the submission future has resolved
    fn finish_submission(&mut self, result: Result<SubmitOutcome, AgentError>) {
        self.is_processing = false;
        if let Err(AgentError::Busy) = result {
            self.show_notice("A reply is still pending.");
        }
    }

    fn scroll_to_bottom(&mut self) {
        // Resolved during render from the content height
        self.scroll = usize::MAX;
    }

    /// Show local output that is not part of the conversation
    pub fn show_notice(&mut self, content: &str) {
        self.messages.push(ChatMessage::notice(content));
        self.scroll_to_bottom();
    }

    /// Forget the scrollback after a new session starts
    pub fn reset(&mut self) {
        self.messages.clear();
        self.scroll = 0;
        self.status = "New conversation".to_string();
    }

    /// Handle keyboard action. Returns `false` when the UI should exit.
    pub async fn handle_action(&mut self, action: Action, width: u16) -> bool {
        match action {
            Action::Submit => {
                // Blank input and submissions while a reply is pending leave
                // the box untouched.
                if !self.input.is_blank() && !self.is_processing {
                    let content = self.input.take();
                    let msg = if content.trim_start().starts_with('/') {
                        UiMessage::Command(content)
                    } else {
                        UiMessage::Submit(content)
                    };
                    let _ = self.ui_tx.send(msg).await;
                }
                true
            }
            Action::Quit | Action::Interrupt | Action::Eof => {
                let _ = self.ui_tx.send(UiMessage::Quit).await;
                false
            }
            Action::Escape => {
                self.input.clear();
                true
            }
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                true
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                true
            }
            _ => {
                self.input.handle_action(&action, width);
                true
            }
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // Messages
                Constraint::Length(1), // Status
                Constraint::Length(3), // Input
            ])
            .split(size);

        self.render_messages(frame, chunks[0]);
        self.render_status(frame, chunks[1]);
        self.input
            .render(chunks[2], frame.buffer_mut(), &self.theme);
    }

    fn model_name(&self) -> &str {
        self.model
            .id
            .split('/')
            .next_back()
            .unwrap_or(&self.model.id)
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(" concierge │ {} ", self.model_name());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(title);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 || self.messages.is_empty() {
            frame.render_widget(self.welcome(), inner);
            return;
        }

        let content_height = calculate_message_height(&self.messages, inner.width as usize);

        if self.scroll == usize::MAX {
            self.scroll = content_height.saturating_sub(inner.height as usize);
        } else {
            self.scroll = self
                .scroll
                .min(content_height.saturating_sub(inner.height as usize));
        }

        let message_list = MessageList::new(&self.messages, &self.theme).scroll(self.scroll);
        frame.render_widget(message_list, inner);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn welcome(&self) -> Paragraph<'static> {
        let key = |k: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(k, self.theme.accent_style()),
                Span::styled(what, self.theme.base_style()),
            ])
        };

        let mut lines = vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    "  Welcome to Customer Service!",
                    self.theme.accent_style().add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(
                "  How can I assist you today?",
                self.theme.base_style(),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("  Model: {}", self.model_name()),
                self.theme.dim_style(),
            )),
            Line::from(""),
            Line::from(Span::styled("  Keybindings", self.theme.warning_style())),
            Line::from(""),
            key("    Enter     ", "Send message"),
            key("    PgUp/Dn   ", "Scroll history"),
            key("    Esc       ", "Clear input"),
            key("    Ctrl+C    ", "Quit"),
            Line::from(""),
            Line::from(Span::styled(
                "  Type /help for customer lookup and other commands.",
                self.theme.dim_style(),
            )),
        ];
        if let Some(warning) = &self.warning {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("  Warning: {}", warning),
                self.theme.warning_style(),
            )));
        }
        Paragraph::new(lines)
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if self.is_processing {
            let spinner =
                Spinner::new(&self.status, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let mut left_content = format!("{} │ {}", self.model_name(), self.status);
        if self.warning.is_some() {
            left_content.push_str(" │ customers offline");
        }
        let right_content = "/help: commands │ Ctrl+C: quit";

        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(&left_content, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, self.theme.dim_style()),
            ])
        } else {
            Line::from(Span::styled(&left_content, self.theme.dim_style()))
        };

        frame.render_widget(Paragraph::new(line), area);
    }
}

type Term = ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>;

fn restore_terminal(terminal: &mut Term) -> anyhow::Result<()> {
    use crossterm::{
        event::DisableBracketedPaste,
        execute,
        terminal::{LeaveAlternateScreen, disable_raw_mode},
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI application
pub async fn run_tui(app: &App) -> anyhow::Result<()> {
    use crate::commands::{CommandContext, CommandResult, execute_command};
    use crossterm::{
        event::EnableBracketedPaste,
        execute,
        terminal::{EnterAlternateScreen, enable_raw_mode},
    };
    use ratatui::{Terminal, backend::CrosstermBackend};
    use std::io;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (ui_tx, mut ui_rx) = mpsc::channel::<UiMessage>(32);
    let mut state = TuiState::new(app.model.clone(), app.theme.clone(), ui_tx)
        .with_warning(app.directory_notice.clone());

    let mut session = app.factory.create();
    let mut session_rx = session.subscribe();

    let mut event_stream = EventStream::new();

    // 80ms keeps the spinner smooth
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(80));

    // Set by the UI, consumed at the top of the next iteration
    let mut pending_submit: Option<String> = None;

    let result = loop {
        if let Some(content) = pending_submit.take() {
            let mut submit_future = std::pin::pin!(session.submit_text(content));

            loop {
                terminal.draw(|frame| state.render(frame))?;
                let area_width = terminal.size()?.width;

                tokio::select! {
                    biased;

                    result = &mut submit_future => {
                        while let Ok(event) = session_rx.try_recv() {
                            state.handle_session_event(event);
                        }
                        state.finish_submission(result);
                        break;
                    }

                    event = session_rx.recv() => {
                        if let Ok(event) = event {
                            state.handle_session_event(event);
                        }
                    }

                    // Typing continues while the reply is pending; it is
                    // submitted once the session is idle again.
                    event = event_stream.next() => {
                        match event {
                            Some(Ok(Event::Key(key))) => {
                                let action = concierge_tui::input::key_to_action(key);
                                match action {
                                    Action::Interrupt | Action::Quit => {
                                        restore_terminal(&mut terminal)?;
                                        return Ok(());
                                    }
                                    Action::Submit => {}
                                    Action::PageUp | Action::PageDown => {
                                        state.handle_action(action, area_width).await;
                                    }
                                    _ => {
                                        state.input.handle_action(&action, area_width);
                                    }
                                }
                            }
                            Some(Ok(Event::Paste(text))) => {
                                state.input.handle_action(&Action::Paste(text), area_width);
                            }
                            Some(Ok(_)) => {}
                            Some(Err(_)) | None => {
                                restore_terminal(&mut terminal)?;
                                return Ok(());
                            }
                        }
                    }

                    _ = tick_interval.tick() => {}
                }
            }

            terminal.draw(|frame| state.render(frame))?;
            continue;
        }

        terminal.draw(|frame| state.render(frame))?;

        let area_width = terminal.size()?.width;

        tokio::select! {
            biased;

            event = session_rx.recv() => {
                if let Ok(event) = event {
                    state.handle_session_event(event);
                }
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(Event::Key(key))) => {
                        let action = concierge_tui::input::key_to_action(key);
                        if !state.handle_action(action, area_width).await {
                            break Ok(());
                        }
                    }
                    Some(Ok(Event::Paste(text))) => {
                        state.handle_action(Action::Paste(text), area_width).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break Err(anyhow::anyhow!("Event error: {}", e));
                    }
                    None => {
                        break Ok(());
                    }
                }
            }

            _ = tick_interval.tick() => {}

            msg = ui_rx.recv() => {
                match msg {
                    Some(UiMessage::Submit(content)) => {
                        pending_submit = Some(content);
                    }
                    Some(UiMessage::Command(cmd)) => {
                        let ctx = CommandContext {
                            directory: app.directory.as_ref(),
                            session: &session,
                            model: &app.model,
                        };
                        match execute_command(&cmd, &ctx).await {
                            Some(CommandResult::Message(msg)) => {
                                state.show_notice(&msg);
                            }
                            Some(CommandResult::NewSession) => {
                                session = app.factory.create();
                                session_rx = session.subscribe();
                                state.reset();
                            }
                            Some(CommandResult::Exit) => {
                                break Ok(());
                            }
                            Some(CommandResult::Unknown(cmd)) => {
                                state.show_notice(&format!(
                                    "Unknown command: /{}\nType /help for available commands.",
                                    cmd
                                ));
                            }
                            None => {}
                        }
                    }
                    Some(UiMessage::Quit) | None => {
                        break Ok(());
                    }
                }
            }
        }
    };

    restore_terminal(&mut terminal)?;
    result
}
