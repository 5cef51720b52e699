//! Selectable table of records shared by the list screens

use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Block, Borders, Row, Table, TableState},
    Frame,
};

use crate::tui::{traits::Navigable, ui::Styles};

/// Selection state over the visible rows of a list screen.
///
/// The rows themselves are rebuilt from the view on every draw; the table
/// only tracks how many there are and which one is highlighted.
#[derive(Debug, Default)]
pub struct RecordTable {
    pub state: TableState,
    item_count: usize,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the row count after filtering, keeping the selection in range
    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        let selected = match self.state.selected() {
            _ if count == 0 => None,
            Some(i) => Some(i.min(count - 1)),
            None => Some(0),
        };
        self.state.select(selected);
    }

    /// Pick the selected element out of the visible rows
    pub fn selected_in<'a, T>(&self, rows: &[&'a T]) -> Option<&'a T> {
        self.state.selected().and_then(|i| rows.get(i).copied())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        title: String,
        header: Vec<String>,
        rows: Vec<Row<'static>>,
        widths: &[Constraint],
        focused: bool,
    ) {
        self.set_item_count(rows.len());

        let border_style = if focused {
            Styles::active_border()
        } else {
            Styles::inactive_border()
        };

        let table = Table::new(rows, widths.to_vec())
            .header(Row::new(header).style(Styles::header()))
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(border_style),
            )
            .highlight_style(Styles::selected())
            .highlight_symbol("> ");

        f.render_stateful_widget(table, area, &mut self.state);
    }
}

impl Navigable for RecordTable {
    fn navigate_up(&mut self) {
        if self.item_count == 0 {
            return;
        }
        let selected = self.state.selected().unwrap_or(0);
        self.state.select(Some(selected.saturating_sub(1)));
    }

    fn navigate_down(&mut self) {
        if self.item_count == 0 {
            return;
        }
        let selected = self.state.selected().map_or(0, |i| i + 1);
        self.state.select(Some(selected.min(self.item_count - 1)));
    }

    fn get_selected_index(&self) -> Option<usize> {
        self.state.selected()
    }

    fn set_selected_index(&mut self, index: Option<usize>) {
        self.state.select(index);
    }

    fn get_item_count(&self) -> usize {
        self.item_count
    }
}
