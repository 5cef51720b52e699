//! Screen modules for the terminal UI

pub mod abonnes;
pub mod dashboard;
pub mod documents;
pub mod emprunts;
pub mod help;

pub use abonnes::AbonnesScreen;
pub use dashboard::DashboardScreen;
pub use documents::DocumentsScreen;
pub use emprunts::EmpruntsScreen;
pub use help::HelpScreen;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::components::Form;
use super::traits::{FormHandler, Navigable};
use super::ui::Styles;

/// Add/edit popup state; `id` is set when editing an existing record
#[derive(Debug, Clone)]
pub struct EditForm {
    pub form: Form,
    pub id: Option<String>,
}

/// Outcome of a key pressed inside an edit form
pub(crate) enum FormKey {
    Submit,
    Cancel,
    Handled,
}

pub(crate) fn handle_form_key(form: &mut Form, key: KeyEvent) -> FormKey {
    match key.code {
        KeyCode::Enter => return FormKey::Submit,
        KeyCode::Esc => return FormKey::Cancel,
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.previous_field(),
        KeyCode::Left => form.move_left(),
        KeyCode::Right => form.move_right(),
        KeyCode::Backspace => form.handle_backspace(),
        KeyCode::Char(c) => form.handle_char_input(c),
        _ => {}
    }
    FormKey::Handled
}

/// Type-to-search input; returns false once the search box is left.
/// Esc also clears the query.
pub(crate) fn handle_search_key(query: &mut String, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Enter => false,
        KeyCode::Esc => {
            query.clear();
            false
        }
        KeyCode::Backspace => {
            query.pop();
            true
        }
        KeyCode::Char(c) => {
            query.push(c);
            true
        }
        _ => true,
    }
}

/// Arrow/Home/End movement in a list; returns whether the key was used
pub(crate) fn handle_navigation_key(list: &mut impl Navigable, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => list.navigate_up(),
        KeyCode::Down | KeyCode::Char('j') => list.navigate_down(),
        KeyCode::Home => list.navigate_to_first(),
        KeyCode::End => list.navigate_to_last(),
        _ => return false,
    }
    true
}

/// Sort key bound to a digit, `1` being the first column
pub(crate) fn digit_key<K: Copy>(key: KeyEvent, keys: &[K]) -> Option<K> {
    match key.code {
        KeyCode::Char(c) => c
            .to_digit(10)
            .and_then(|d| (d as usize).checked_sub(1))
            .and_then(|i| keys.get(i).copied()),
        _ => None,
    }
}

/// Search box line above a list: query, active filter, shown/total counts
pub(crate) fn render_search_bar(
    f: &mut Frame,
    area: Rect,
    query: &str,
    searching: bool,
    filter: Option<&str>,
    shown: usize,
    total: usize,
) {
    let mut spans = vec![
        Span::styled("Search: ", Styles::title()),
        Span::raw(query.to_string()),
    ];
    if searching {
        spans.push(Span::styled("_", Styles::active_border()));
    }
    if let Some(filter) = filter {
        spans.push(Span::raw("   "));
        spans.push(Span::styled("Filter: ", Styles::title()));
        spans.push(Span::raw(filter.to_string()));
    }
    spans.push(Span::styled(format!("   {}/{}", shown, total), Styles::inactive()));

    let border = if searching {
        Styles::active_border()
    } else {
        Styles::inactive_border()
    };
    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(border));
    f.render_widget(paragraph, area);
}
