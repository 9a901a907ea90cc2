//! Scrollback widget rendering the conversation in order

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// Who a displayed entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    /// Local output (command results, notices); never part of the conversation
    Notice,
}

/// A single entry in the scrollback
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Rendered with the error style
    pub is_error: bool,
    /// Reply still arriving
    pub is_streaming: bool,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Assistant placeholder that grows as deltas arrive
    pub fn assistant_streaming(content: impl Into<String>) -> Self {
        Self {
            is_streaming: true,
            ..Self::new(ChatRole::Assistant, content)
        }
    }

    pub fn notice(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Notice, content)
    }

    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }
}

/// Widget for displaying the scrollback
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
        }
    }

    /// Set scroll offset in lines
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// All rendered lines for the given width
    pub fn lines(&self, width: usize) -> Vec<Line<'static>> {
        self.messages
            .iter()
            .flat_map(|msg| render_message(msg, self.theme, width))
            .collect()
    }
}

fn render_message(msg: &ChatMessage, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, header_style, prefix) = match msg.role {
        ChatRole::User => ("You", theme.user_header(), "▶ "),
        ChatRole::Assistant => ("Assistant", theme.assistant_header(), "◀ "),
        ChatRole::Notice => ("Notice", theme.dim_style(), "● "),
    };
    let header = if msg.is_streaming {
        format!("{}{} ▌", prefix, label)
    } else {
        format!("{}{}", prefix, label)
    };
    lines.push(Line::from(Span::styled(header, header_style)));

    let content_style = if msg.is_error {
        theme.error_style()
    } else if msg.role == ChatRole::Notice {
        theme.dim_style()
    } else {
        theme.base_style()
    };

    if msg.content.is_empty() && msg.is_streaming {
        lines.push(Line::from(Span::styled(
            "  waiting for reply...",
            theme.warning_style(),
        )));
    } else {
        // Text is shown as-is; markup in replies is not interpreted.
        let content_width = width.saturating_sub(2).max(1);
        for paragraph in msg.content.split('\n') {
            if paragraph.is_empty() {
                lines.push(Line::from(""));
                continue;
            }
            for line in textwrap::wrap(paragraph, content_width) {
                lines.push(Line::from(Span::styled(format!("  {}", line), content_style)));
            }
        }
    }

    lines.push(Line::from(""));
    lines
}

/// Total rendered height of the scrollback at `width`
pub fn calculate_message_height(messages: &[ChatMessage], width: usize) -> usize {
    let theme = Theme::dark();
    MessageList::new(messages, &theme).lines(width).len()
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let visible: Vec<Line> = self
            .lines(area.width as usize)
            .into_iter()
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();

        Paragraph::new(visible).render(area, buf);
    }
}
