//! Dashboard screen: backend counters and locally derived loan statuses

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::loan_status::StatusColor;
use crate::models::{LoanStatus, Stats};
use crate::tui::{
    app::Screen,
    traits::{ApiRequest, ScreenAction},
    ui::Styles,
};

/// Dashboard screen state
#[derive(Debug, Default)]
pub struct DashboardScreen {
    pub stats: Option<Stats>,
    pub last_refresh: Option<DateTime<Local>>,
}

impl DashboardScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stats(&mut self, stats: Stats) {
        self.stats = Some(stats);
        self.last_refresh = Some(Local::now());
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        match key.code {
            KeyCode::Char('1') => ScreenAction::NavigateTo(Screen::Documents),
            KeyCode::Char('2') => ScreenAction::NavigateTo(Screen::Abonnes),
            KeyCode::Char('3') => ScreenAction::NavigateTo(Screen::Emprunts),
            KeyCode::Char('4') => ScreenAction::NavigateTo(Screen::Help),
            KeyCode::Char('r') | KeyCode::F(5) => ScreenAction::Request(ApiRequest::LoadAll),
            _ => ScreenAction::None,
        }
    }

    /// `loan_counts` are the statuses derived on the client from the loaded loans
    pub fn draw(&self, f: &mut Frame, area: Rect, loan_counts: &[(LoanStatus, usize)]) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(5),
                Constraint::Length(5),
                Constraint::Min(0),
            ])
            .split(area);

        let refreshed = self
            .last_refresh
            .map(|t| format!("Updated {}", t.format("%d/%m/%Y %H:%M:%S")))
            .unwrap_or_else(|| "Loading...".to_string());
        let title = Paragraph::new(Line::from(vec![
            Span::styled("Médiathèque", Styles::title()),
            Span::raw("  "),
            Span::styled(refreshed, Styles::inactive()),
        ]))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, rows[0]);

        let stats = self.stats.clone().unwrap_or_default();
        let counters = [
            ("Documents", stats.total_documents.to_string(), Styles::info()),
            ("Abonnés", stats.total_abonnes.to_string(), Styles::info()),
            (
                "Emprunts en cours",
                stats.emprunts_en_cours.to_string(),
                Styles::loan_status(StatusColor::Primary),
            ),
            (
                "Emprunts en retard",
                stats.emprunts_en_retard.to_string(),
                Styles::loan_status(StatusColor::Error),
            ),
        ];
        render_counters(f, rows[1], &counters);

        let optional = |value: Option<u64>| value.map_or("-".to_string(), |v| v.to_string());
        let mut local = vec![
            (
                "Documents disponibles",
                optional(stats.total_documents_dispo),
                Styles::availability(true),
            ),
            (
                "Documents empruntés",
                optional(stats.total_documents_empruntes),
                Styles::availability(false),
            ),
        ];
        for (status, count) in loan_counts {
            local.push((status.label(), count.to_string(), Styles::loan_status((*status).into())));
        }
        render_counters(f, rows[2], &local);

        let help = Paragraph::new(vec![
            Line::from(""),
            Line::from("1: Documents   2: Abonnés   3: Emprunts   4: Aide"),
            Line::from("Tab / Shift+Tab: switch screens   r / F5: refresh"),
        ])
        .alignment(Alignment::Center)
        .style(Styles::inactive());
        f.render_widget(help, rows[3]);
    }
}

fn render_counters(f: &mut Frame, area: Rect, counters: &[(&str, String, Style)]) {
    if counters.is_empty() {
        return;
    }
    let share = 100 / counters.len() as u16;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            counters
                .iter()
                .map(|_| Constraint::Percentage(share))
                .collect::<Vec<_>>(),
        )
        .split(area);

    for ((label, value, style), column) in counters.iter().zip(columns.iter()) {
        let paragraph = Paragraph::new(vec![Line::from(""), Line::from(Span::styled(value.clone(), *style))])
            .alignment(Alignment::Center)
            .block(Block::default().title(label.to_string()).borders(Borders::ALL));
        f.render_widget(paragraph, *column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn test_shortcuts() {
        let mut screen = DashboardScreen::new();
        let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
        assert_eq!(screen.handle_key(key('3')), ScreenAction::NavigateTo(Screen::Emprunts));
        assert_eq!(screen.handle_key(key('r')), ScreenAction::Request(ApiRequest::LoadAll));
        assert_eq!(screen.handle_key(key('x')), ScreenAction::None);
    }
}
