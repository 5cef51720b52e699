//! Documents list screen

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Cell, Row},
    Frame,
};

use super::{
    digit_key, handle_form_key, handle_navigation_key, handle_search_key, render_search_bar,
    EditForm, FormKey,
};
use crate::export::ExportFormat;
use crate::forms::DocumentForm;
use crate::models::{display_date, Document, DocumentType};
use crate::tui::{
    app::Screen,
    components::{Form, FormField, RecordTable},
    traits::{ApiRequest, ScreenAction},
    ui::{sort_header, Styles},
};
use crate::views::{DocumentSortKey, DocumentsView};

const YES: &str = "oui";
const NO: &str = "non";

/// Documents screen state
#[derive(Default)]
pub struct DocumentsScreen {
    pub view: DocumentsView,
    pub table: RecordTable,
    pub searching: bool,
    pub form: Option<EditForm>,
}

impl DocumentsScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text input owns the keyboard
    pub fn is_editing(&self) -> bool {
        self.searching || self.form.is_some()
    }

    pub fn set_documents(&mut self, documents: Vec<Document>) {
        self.view.set_records(documents);
        self.sync_table();
    }

    pub fn sync_table(&mut self) {
        let count = self.view.visible().len();
        self.table.set_item_count(count);
    }

    pub fn selected(&self) -> Option<&Document> {
        let rows = self.view.visible();
        self.table.selected_in(&rows)
    }

    pub fn open_form(&mut self, document: Option<&Document>) {
        let values = document.map(DocumentForm::from_document).unwrap_or_default();
        let title = if document.is_some() {
            "Modifier le document"
        } else {
            "Nouveau document"
        };
        self.form = Some(EditForm {
            form: document_form(title, &values),
            id: document.map(|d| d.id.clone()),
        });
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        if let Some(edit) = &mut self.form {
            return match handle_form_key(&mut edit.form, key) {
                FormKey::Submit => {
                    let id = edit.id.clone();
                    match read_document_form(&edit.form)
                        .submit(|payload| ApiRequest::SaveDocument { id, payload })
                    {
                        Ok(request) => {
                            self.form = None;
                            ScreenAction::Request(request)
                        }
                        Err(errors) => {
                            edit.form.set_errors(&errors);
                            ScreenAction::SetError(format!("Document rejected: {}", errors))
                        }
                    }
                }
                FormKey::Cancel => {
                    self.form = None;
                    ScreenAction::None
                }
                FormKey::Handled => ScreenAction::None,
            };
        }

        if self.searching {
            self.searching = handle_search_key(&mut self.view.query, key);
            self.sync_table();
            return ScreenAction::None;
        }

        if handle_navigation_key(&mut self.table, key) {
            return ScreenAction::None;
        }
        if let Some(sort_key) = digit_key(key, &DocumentSortKey::ALL) {
            self.view.request_sort(sort_key);
            return ScreenAction::None;
        }

        match key.code {
            KeyCode::Char('/') => {
                self.searching = true;
                ScreenAction::None
            }
            KeyCode::Char('f') => {
                self.view.availability = self.view.availability.next();
                self.sync_table();
                ScreenAction::SetStatus(format!("Showing: {}", self.view.availability.label()))
            }
            KeyCode::Char('a') => {
                self.open_form(None);
                ScreenAction::None
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                let selected = self.selected().cloned();
                match selected {
                    Some(document) => {
                        self.open_form(Some(&document));
                        ScreenAction::None
                    }
                    None => ScreenAction::SetError("No document selected".to_string()),
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => match self.selected() {
                Some(document) => ScreenAction::Confirm {
                    message: format!("Delete document \"{}\"?", document.titre),
                    request: ApiRequest::DeleteDocument {
                        id: document.id.clone(),
                    },
                },
                None => ScreenAction::SetError("No document selected".to_string()),
            },
            KeyCode::Char('p') => ScreenAction::Export(ExportFormat::Pdf),
            KeyCode::Char('c') => ScreenAction::Export(ExportFormat::Csv),
            KeyCode::Char('r') | KeyCode::F(5) => ScreenAction::Request(ApiRequest::LoadDocuments),
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
            Some(self.view.availability.label()),
            visible.len(),
            self.view.records().len(),
        );

        let header = DocumentSortKey::ALL
            .iter()
            .enumerate()
            .map(|(i, key)| sort_header(i, key.label(), *key, &self.view.sort))
            .collect();
        let rows: Vec<Row<'static>> = visible.iter().map(|d| document_row(d)).collect();
        let widths = [
            Constraint::Percentage(28),
            Constraint::Percentage(20),
            Constraint::Percentage(10),
            Constraint::Percentage(16),
            Constraint::Percentage(12),
            Constraint::Percentage(14),
        ];

        let focused = !self.is_editing();
        self.table.render(
            f,
            chunks[1],
            "Documents".to_string(),
            header,
            rows,
            &widths,
            focused,
        );

        if let Some(edit) = &self.form {
            edit.form.render(f, area);
        }
    }
}

fn document_row(document: &Document) -> Row<'static> {
    Row::new(vec![
        Cell::from(document.titre.clone()),
        Cell::from(document.auteur.clone()),
        Cell::from(document.doc_type.as_str().to_string()),
        Cell::from(document.isbn.clone()),
        Cell::from(display_date(document.date_publication)),
        Cell::from(document.availability_label()).style(Styles::availability(document.disponible)),
    ])
}

fn document_form(title: &str, values: &DocumentForm) -> Form {
    let types = DocumentType::ALL
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();
    Form::new(
        title,
        vec![
            FormField::text("titre", "Titre").with_value(&values.titre),
            FormField::text("auteur", "Auteur").with_value(&values.auteur),
            FormField::choice("type", "Type", types).with_value(&values.doc_type),
            FormField::text("isbn", "ISBN")
                .with_placeholder("requis pour un livre")
                .with_value(&values.isbn),
            FormField::date("date_publication", "Date de publication")
                .with_value(&values.date_publication),
            FormField::choice("disponible", "Disponible", vec![YES.to_string(), NO.to_string()])
                .with_value(if values.disponible { YES } else { NO }),
        ],
    )
}

fn read_document_form(form: &Form) -> DocumentForm {
    DocumentForm {
        titre: form.value("titre"),
        auteur: form.value("auteur"),
        doc_type: form.value("type"),
        isbn: form.value("isbn"),
        date_publication: form.value("date_publication"),
        disponible: form.value("disponible") != NO,
    }
}
