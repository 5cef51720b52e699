//! y/n confirmation popup guarding destructive requests

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::tui::{
    traits::ApiRequest,
    ui::{centered_rect, Styles},
};

/// Answer to a confirmation dialog
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Confirmed(ApiRequest),
    Cancelled,
    Pending,
}

/// Pending confirmation holding the request to run on `y`
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
    pub message: String,
    pub request: ApiRequest,
}

impl ConfirmDialog {
    pub fn new(message: String, request: ApiRequest) -> Self {
        Self { message, request }
    }

    pub fn handle_key(&self, key: KeyEvent) -> ConfirmOutcome {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('o') | KeyCode::Char('O') => {
                ConfirmOutcome::Confirmed(self.request.clone())
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ConfirmOutcome::Cancelled,
            _ => ConfirmOutcome::Pending,
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let popup = centered_rect(50, 25, area);
        f.render_widget(Clear, popup);

        let text = vec![
            Line::from(""),
            Line::from(self.message.clone()),
            Line::from(""),
            Line::from(vec![
                Span::styled("y", Styles::title()),
                Span::raw(": confirm   "),
                Span::styled("n", Styles::title()),
                Span::raw("/Esc: cancel"),
            ]),
        ];

        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("Confirm")
                    .borders(Borders::ALL)
                    .border_style(Styles::error()),
            );
        f.render_widget(paragraph, popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_answers() {
        let dialog = ConfirmDialog::new(
            "Delete?".to_string(),
            ApiRequest::DeleteDocument { id: "d1".to_string() },
        );
        assert_eq!(
            dialog.handle_key(key(KeyCode::Char('y'))),
            ConfirmOutcome::Confirmed(ApiRequest::DeleteDocument { id: "d1".to_string() })
        );
        assert_eq!(dialog.handle_key(key(KeyCode::Esc)), ConfirmOutcome::Cancelled);
        assert_eq!(dialog.handle_key(key(KeyCode::Char('x'))), ConfirmOutcome::Pending);
    }
}
