//! Loans list screen with the new-loan picker

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row},
    Frame,
};

use super::{digit_key, handle_navigation_key, handle_search_key, render_search_bar};
use crate::export::ExportFormat;
use crate::forms::EmpruntForm;
use crate::models::{display_datetime, Abonne, Document, Emprunt};
use crate::tui::{
    app::Screen,
    components::RecordTable,
    traits::{ApiRequest, ScreenAction},
    ui::{centered_rect, sort_header, Styles},
};
use crate::views::{AbonnesView, DocumentsView, EmpruntSortKey, EmpruntsView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerFocus {
    Abonne,
    Document,
}

/// New loan popup: a searchable subscriber list and a searchable list of
/// available documents
pub struct LoanPicker {
    pub focus: PickerFocus,
    abonnes: AbonnesView,
    documents: DocumentsView,
    pub abonne_query: String,
    pub document_query: String,
    pub abonne_state: ListState,
    pub document_state: ListState,
}

impl LoanPicker {
    pub fn new(abonnes: Vec<Abonne>, documents: Vec<Document>) -> Self {
        let mut picker = Self {
            focus: PickerFocus::Abonne,
            abonnes: AbonnesView::new(),
            documents: DocumentsView::new(),
            abonne_query: String::new(),
            document_query: String::new(),
            abonne_state: ListState::default(),
            document_state: ListState::default(),
        };
        picker.abonnes.set_records(abonnes);
        picker.documents.set_records(documents);
        picker.reset_selection();
        picker
    }

    /// Subscribers matching the query on "nom prenom"
    pub fn abonne_candidates(&self) -> Vec<&Abonne> {
        self.abonnes.matching_name(&self.abonne_query)
    }

    /// Available documents matching the query on the title
    pub fn document_candidates(&self) -> Vec<&Document> {
        self.documents.available_matching(&self.document_query)
    }

    fn reset_selection(&mut self) {
        let abonnes = self.abonne_candidates().len();
        let documents = self.document_candidates().len();
        self.abonne_state.select((abonnes > 0).then_some(0));
        self.document_state.select((documents > 0).then_some(0));
    }

    pub fn selected_abonne(&self) -> Option<&Abonne> {
        self.abonne_state
            .selected()
            .and_then(|i| self.abonne_candidates().get(i).copied())
    }

    pub fn selected_document(&self) -> Option<&Document> {
        self.document_state
            .selected()
            .and_then(|i| self.document_candidates().get(i).copied())
    }

    pub fn form(&self) -> EmpruntForm {
        EmpruntForm {
            abonne_id: self.selected_abonne().map(|a| a.id.clone()),
            document_id: self.selected_document().map(|d| d.id.clone()),
        }
    }

    fn move_selection(&mut self, down: bool) {
        let count = match self.focus {
            PickerFocus::Abonne => self.abonne_candidates().len(),
            PickerFocus::Document => self.document_candidates().len(),
        };
        if count == 0 {
            return;
        }
        let state = match self.focus {
            PickerFocus::Abonne => &mut self.abonne_state,
            PickerFocus::Document => &mut self.document_state,
        };
        let current = state.selected().unwrap_or(0);
        let next = if down {
            (current + 1).min(count - 1)
        } else {
            current.saturating_sub(1)
        };
        state.select(Some(next));
    }

    fn edit_query(&mut self, key: KeyEvent) {
        let query = match self.focus {
            PickerFocus::Abonne => &mut self.abonne_query,
            PickerFocus::Document => &mut self.document_query,
        };
        match key.code {
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(c) => query.push(c),
            _ => return,
        }
        self.reset_selection();
    }

    fn render(&mut self, f: &mut Frame, area: Rect) {
        let popup = centered_rect(90, 70, area);
        f.render_widget(Clear, popup);

        let outer = Block::default()
            .title("Nouvel emprunt (Tab: changer de liste, Enter: valider, Esc: annuler)")
            .borders(Borders::ALL)
            .border_style(Styles::active_border());
        let inner = outer.inner(popup);
        f.render_widget(outer, popup);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(inner);

        let abonnes: Vec<String> = self
            .abonne_candidates()
            .iter()
            .map(|a| format!("{} <{}>", a.full_name(), a.email))
            .collect();
        let documents: Vec<String> = self
            .document_candidates()
            .iter()
            .map(|d| format!("{} ({})", d.titre, d.auteur))
            .collect();

        let abonne_focus = self.focus == PickerFocus::Abonne;
        render_picker_column(
            f,
            columns[0],
            "Abonné",
            &self.abonne_query,
            abonnes,
            &mut self.abonne_state,
            abonne_focus,
        );
        render_picker_column(
            f,
            columns[1],
            "Document disponible",
            &self.document_query,
            documents,
            &mut self.document_state,
            !abonne_focus,
        );
    }
}

fn render_picker_column(
    f: &mut Frame,
    area: Rect,
    title: &str,
    query: &str,
    items: Vec<String>,
    state: &mut ListState,
    focused: bool,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    let border = if focused {
        Styles::active_border()
    } else {
        Styles::inactive_border()
    };

    let input = Paragraph::new(Line::from(vec![
        Span::raw(query.to_string()),
        Span::styled(if focused { "_" } else { "" }, Styles::active_border()),
    ]))
    .block(
        Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(border),
    );
    f.render_widget(input, chunks[0]);

    let empty = items.is_empty();
    let list = List::new(items.into_iter().map(ListItem::new).collect::<Vec<_>>())
        .block(
            Block::default()
                .title(if empty { "Aucun résultat" } else { "" })
                .borders(Borders::ALL)
                .border_style(border),
        )
        .highlight_style(Styles::selected())
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[1], state);
}

/// Loans screen state
#[derive(Default)]
pub struct EmpruntsScreen {
    pub view: EmpruntsView,
    pub table: RecordTable,
    pub searching: bool,
    pub picker: Option<LoanPicker>,
}

impl EmpruntsScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        self.searching || self.picker.is_some()
    }

    pub fn set_emprunts(&mut self, emprunts: Vec<Emprunt>, now: DateTime<Utc>) {
        self.view.set_records(emprunts, now);
        self.sync_table();
    }

    pub fn sync_table(&mut self) {
        let count = self.view.visible().len();
        self.table.set_item_count(count);
    }

    pub fn selected(&self) -> Option<&Emprunt> {
        let rows = self.view.visible();
        self.table.selected_in(&rows)
    }

    pub fn open_picker(&mut self, abonnes: Vec<Abonne>, documents: Vec<Document>) {
        self.picker = Some(LoanPicker::new(abonnes, documents));
    }

    fn handle_picker_key(&mut self, key: KeyEvent) -> ScreenAction {
        let Some(picker) = &mut self.picker else {
            return ScreenAction::None;
        };
        match key.code {
            KeyCode::Esc => {
                self.picker = None;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                picker.focus = match picker.focus {
                    PickerFocus::Abonne => PickerFocus::Document,
                    PickerFocus::Document => PickerFocus::Abonne,
                };
            }
            KeyCode::Up => picker.move_selection(false),
            KeyCode::Down => picker.move_selection(true),
            KeyCode::Enter => {
                return match picker
                    .form()
                    .submit(|payload| ApiRequest::CreateEmprunt { payload })
                {
                    Ok(request) => {
                        self.picker = None;
                        ScreenAction::Request(request)
                    }
                    Err(errors) => ScreenAction::SetError(format!("Loan rejected: {}", errors)),
                };
            }
            _ => picker.edit_query(key),
        }
        ScreenAction::None
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        if self.picker.is_some() {
            return self.handle_picker_key(key);
        }

        if self.searching {
            self.searching = handle_search_key(&mut self.view.query, key);
            self.sync_table();
            return ScreenAction::None;
        }

        if handle_navigation_key(&mut self.table, key) {
            return ScreenAction::None;
        }
        if let Some(sort_key) = digit_key(key, &EmpruntSortKey::ALL) {
            self.view.request_sort(sort_key);
            return ScreenAction::None;
        }

        match key.code {
            KeyCode::Char('/') => {
                self.searching = true;
                ScreenAction::None
            }
            KeyCode::Char('f') => {
                self.view.status = self.view.status.next();
                self.sync_table();
                ScreenAction::SetStatus(format!("Showing: {}", self.view.status.label()))
            }
            KeyCode::Char('n') | KeyCode::Char('a') => ScreenAction::OpenLoanPicker,
            KeyCode::Char('r') => match self.selected() {
                Some(emprunt) if emprunt.is_returned() => {
                    ScreenAction::SetError("This loan has already been returned".to_string())
                }
                Some(emprunt) => ScreenAction::Request(ApiRequest::ReturnEmprunt {
                    id: emprunt.id.clone(),
                }),
                None => ScreenAction::SetError("No loan selected".to_string()),
            },
            KeyCode::Char('d') | KeyCode::Delete => match self.selected() {
                Some(emprunt) => ScreenAction::Confirm {
                    message: format!(
                        "Delete the loan of \"{}\" by {}?",
                        emprunt.document_title(),
                        emprunt.abonne_full_name()
                    ),
                    request: ApiRequest::DeleteEmprunt {
                        id: emprunt.id.clone(),
                    },
                },
                None => ScreenAction::SetError("No loan selected".to_string()),
            },
            KeyCode::Char('p') => ScreenAction::Export(ExportFormat::Pdf),
            KeyCode::Char('c') => ScreenAction::Export(ExportFormat::Csv),
            KeyCode::F(5) => ScreenAction::Request(ApiRequest::LoadEmprunts),
            KeyCode::Esc => {
                if self.view.query.is_empty() {
                    ScreenAction::NavigateTo(Screen::Dashboard)
                } else {
                    self.view.query.clear();
                    self.sync_table();
                    ScreenAction::None
                }
            }
            _ => ScreenAction::None,
        }
    }

    pub fn draw(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let visible = self.view.visible();
        render_search_bar(
            f,
            chunks[0],
            &self.view.query,
            self.searching,
            Some(self.view.status.label()),
            visible.len(),
            self.view.records().len(),
        );

        let header = EmpruntSortKey::ALL
            .iter()
            .enumerate()
            .map(|(i, key)| sort_header(i, key.label(), *key, &self.view.sort))
            .collect();
        let rows: Vec<Row<'static>> = visible.iter().map(|e| emprunt_row(e)).collect();
        let widths = [
            Constraint::Percentage(24),
            Constraint::Percentage(20),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
        ];

        let focused = !self.is_editing();
        self.table.render(
            f,
            chunks[1],
            "Emprunts".to_string(),
            header,
            rows,
            &widths,
            focused,
        );

        if let Some(picker) = &mut self.picker {
            picker.render(f, area);
        }
    }
}

fn emprunt_row(emprunt: &Emprunt) -> Row<'static> {
    Row::new(vec![
        Cell::from(emprunt.document_title().to_string()),
        Cell::from(emprunt.abonne_full_name()),
        Cell::from(display_datetime(emprunt.date_emprunt)),
        Cell::from(display_datetime(emprunt.date_retour_prevue)),
        Cell::from(display_datetime(emprunt.date_retour_effective)),
        Cell::from(emprunt.statut.label()).style(Styles::loan_status(emprunt.statut.into())),
    ])
}
