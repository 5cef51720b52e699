//! Status bar messages: the outcome of the last action or request

use std::time::Duration;

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::ui::Styles;

/// Types of status messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
    Info,
    Success,
    Warning,
    Error,
    Loading,
}

/// Status message with type and content
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub status_type: StatusType,
    pub timestamp: DateTime<Local>,
}

impl StatusMessage {
    pub fn new(message: String, status_type: StatusType) -> Self {
        Self {
            message,
            status_type,
            timestamp: Local::now(),
        }
    }
}

/// Status display component
#[derive(Debug, Default)]
pub struct StatusDisplay {
    pub current_message: Option<StatusMessage>,
    /// Non-error messages disappear after this long
    pub auto_clear_timeout: Option<Duration>,
}

impl StatusDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_clear(mut self, timeout: Duration) -> Self {
        self.auto_clear_timeout = Some(timeout);
        self
    }

    pub fn set_message(&mut self, message: StatusMessage) {
        self.current_message = Some(message);
    }

    pub fn set_info(&mut self, message: String) {
        self.set_message(StatusMessage::new(message, StatusType::Info));
    }

    pub fn set_success(&mut self, message: String) {
        self.set_message(StatusMessage::new(message, StatusType::Success));
    }

    pub fn set_warning(&mut self, message: String) {
        self.set_message(StatusMessage::new(message, StatusType::Warning));
    }

    pub fn set_error(&mut self, message: String) {
        self.set_message(StatusMessage::new(message, StatusType::Error));
    }

    pub fn set_loading(&mut self, message: String) {
        self.set_message(StatusMessage::new(message, StatusType::Loading));
    }

    pub fn clear(&mut self) {
        self.current_message = None;
    }

    pub fn get_current(&self) -> Option<&StatusMessage> {
        self.current_message.as_ref()
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self.current_message,
            Some(StatusMessage { status_type: StatusType::Error, .. })
        )
    }

    /// Drop an expired message; errors stay until replaced
    pub fn expire(&mut self, now: DateTime<Local>) {
        let (Some(timeout), Some(message)) = (self.auto_clear_timeout, &self.current_message) else {
            return;
        };
        if matches!(message.status_type, StatusType::Error | StatusType::Loading) {
            return;
        }
        let elapsed = now
            .signed_duration_since(message.timestamp)
            .to_std()
            .unwrap_or_default();
        if elapsed > timeout {
            self.current_message = None;
        }
    }

    /// Render the status bar; `hint` is shown when there is no message
    pub fn render(&self, f: &mut Frame, area: Rect, hint: &str) {
        let (content, style) = match &self.current_message {
            Some(message) => {
                let style = match message.status_type {
                    StatusType::Info => Styles::info(),
                    StatusType::Success => Styles::success(),
                    StatusType::Warning | StatusType::Loading => Styles::warning(),
                    StatusType::Error => Styles::error(),
                };
                (Self::format_message(message), style)
            }
            None => (hint.to_string(), Styles::inactive()),
        };

        let paragraph = Paragraph::new(content).style(style).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::inactive_border()),
        );
        f.render_widget(paragraph, area);
    }

    fn format_message(message: &StatusMessage) -> String {
        let prefix = match message.status_type {
            StatusType::Info => "ℹ",
            StatusType::Success => "✓",
            StatusType::Warning => "⚠",
            StatusType::Error => "✗",
            StatusType::Loading => "⟳",
        };
        format!(
            "{} [{}] {}",
            prefix,
            message.timestamp.format("%H:%M:%S"),
            message.message
        )
    }
}
