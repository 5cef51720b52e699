//! Help screen

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::tui::{app::Screen, traits::ScreenAction, ui::Styles};

/// Help sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpSection {
    Overview,
    Lists,
    Documents,
    Abonnes,
    Emprunts,
}

impl HelpSection {
    pub const ALL: [HelpSection; 5] = [
        HelpSection::Overview,
        HelpSection::Lists,
        HelpSection::Documents,
        HelpSection::Abonnes,
        HelpSection::Emprunts,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            HelpSection::Overview => "Overview",
            HelpSection::Lists => "Lists",
            HelpSection::Documents => "Documents",
            HelpSection::Abonnes => "Abonnés",
            HelpSection::Emprunts => "Emprunts",
        }
    }

    fn lines(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            HelpSection::Overview => vec![
                ("Tab / Shift+Tab", "Next / previous screen"),
                ("F1 / ?", "Toggle the shortcut popup"),
                ("Esc", "Close popup, clear search, back to dashboard"),
                ("q", "Quit (outside text input)"),
                ("F5", "Reload the current screen"),
            ],
            HelpSection::Lists => vec![
                ("↑/↓ j/k", "Move selection"),
                ("Home / End", "First / last row"),
                ("/", "Search; Enter keeps the query, Esc clears it"),
                ("1-6", "Sort by column; again to reverse"),
                ("p / c", "Export visible rows to PDF / CSV"),
                ("d / Del", "Delete after y/n confirmation"),
            ],
            HelpSection::Documents => vec![
                ("f", "Cycle availability: all, available, borrowed"),
                ("a", "New document"),
                ("e / Enter", "Edit selected document"),
                ("←/→", "Change type or availability in the form"),
            ],
            HelpSection::Abonnes => vec![
                ("a", "New subscriber"),
                ("e / Enter", "Edit selected subscriber"),
                ("l", "Show the subscriber's loans"),
            ],
            HelpSection::Emprunts => vec![
                ("f", "Cycle status: all, en cours, en retard, retourné"),
                ("n", "New loan: pick a subscriber and an available document"),
                ("r", "Register the return of the selected loan"),
                ("", "Statuses are re-derived from the due dates periodically"),
            ],
        }
    }
}

/// Help screen state
#[derive(Debug)]
pub struct HelpScreen {
    pub current_section: usize,
    pub section_state: ListState,
}

impl Default for HelpScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl HelpScreen {
    pub fn new() -> Self {
        let mut section_state = ListState::default();
        section_state.select(Some(0));
        Self {
            current_section: 0,
            section_state,
        }
    }

    pub fn section(&self) -> HelpSection {
        HelpSection::ALL[self.current_section]
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.current_section = self.current_section.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.current_section = (self.current_section + 1).min(HelpSection::ALL.len() - 1);
            }
            KeyCode::Esc => return ScreenAction::NavigateTo(Screen::Dashboard),
            _ => {}
        }
        self.section_state.select(Some(self.current_section));
        ScreenAction::None
    }

    pub fn draw(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(20), Constraint::Min(0)])
            .split(area);

        let items: Vec<ListItem> = HelpSection::ALL
            .iter()
            .map(|s| ListItem::new(s.as_str().to_string()))
            .collect();
        let list = List::new(items)
            .block(Block::default().title("Sections").borders(Borders::ALL))
            .highlight_style(Styles::selected());
        f.render_stateful_widget(list, chunks[0], &mut self.section_state);

        let section = self.section();
        let lines: Vec<Line> = section
            .lines()
            .into_iter()
            .map(|(keys, text)| {
                Line::from(vec![
                    Span::styled(format!("{:<18}", keys), Styles::title()),
                    Span::raw(text),
                ])
            })
            .collect();
        let content = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().title(section.as_str().to_string()).borders(Borders::ALL));
        f.render_widget(content, chunks[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn test_section_navigation_is_bounded() {
        let mut help = HelpScreen::new();
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        help.handle_key(key(KeyCode::Up));
        assert_eq!(help.section(), HelpSection::Overview);
        for _ in 0..10 {
            help.handle_key(key(KeyCode::Down));
        }
        assert_eq!(help.section(), HelpSection::Emprunts);
    }
}
