//! Common styles and layout helpers for the terminal UI

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
};

use crate::listing::SortState;
use crate::loan_status::StatusColor;

/// Common UI styles
pub struct Styles;

impl Styles {
    pub fn default() -> Style {
        Style::default()
    }

    pub fn selected() -> Style {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    /// Table header row, in the export header color
    pub fn header() -> Style {
        Style::default()
            .bg(Color::Rgb(63, 81, 181))
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default().fg(Color::Red)
    }

    pub fn success() -> Style {
        Style::default().fg(Color::Green)
    }

    pub fn warning() -> Style {
        Style::default().fg(Color::Yellow)
    }

    pub fn info() -> Style {
        Style::default().fg(Color::Cyan)
    }

    pub fn inactive() -> Style {
        Style::default().fg(Color::Gray)
    }

    pub fn active_border() -> Style {
        Style::default().fg(Color::Yellow)
    }

    pub fn inactive_border() -> Style {
        Style::default().fg(Color::Gray)
    }

    /// Foreground for a derived loan status
    pub fn loan_status(color: StatusColor) -> Style {
        match color {
            StatusColor::Primary => Style::default().fg(Color::Cyan),
            StatusColor::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            StatusColor::Success => Style::default().fg(Color::Green),
        }
    }

    pub fn availability(disponible: bool) -> Style {
        if disponible {
            Self::success()
        } else {
            Self::warning()
        }
    }
}

/// Column header with its shortcut number and sort arrow, e.g. `2 Auteur ▲`
pub fn sort_header<K: Copy + PartialEq>(index: usize, label: &str, key: K, sort: &SortState<K>) -> String {
    let indicator = sort.indicator(key);
    if indicator.is_empty() {
        format!("{} {}", index + 1, label)
    } else {
        format!("{} {} {}", index + 1, label, indicator)
    }
}

/// Center a rectangle within another rectangle
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
