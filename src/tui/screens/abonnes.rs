//! Subscribers list screen, with the per-subscriber loans popup

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Cell, Clear, Row, Table},
    Frame,
};

use super::{
    digit_key, handle_form_key, handle_navigation_key, handle_search_key, render_search_bar,
    EditForm, FormKey,
};
use crate::export::ExportFormat;
use crate::forms::AbonneForm;
use crate::loan_status;
use crate::models::{display_datetime, Abonne, Emprunt};
use crate::tui::{
    app::Screen,
    components::{Form, FormField, RecordTable},
    traits::{ApiRequest, ScreenAction},
    ui::{centered_rect, sort_header, Styles},
};
use crate::views::{AbonneSortKey, AbonnesView};

/// Loans of one subscriber, shown over the list
#[derive(Debug, Clone)]
pub struct AbonneLoans {
    pub abonne_id: String,
    pub name: String,
    pub loans: Vec<Emprunt>,
}

/// Subscribers screen state
#[derive(Default)]
pub struct AbonnesScreen {
    pub view: AbonnesView,
    pub table: RecordTable,
    pub searching: bool,
    pub form: Option<EditForm>,
    pub loans: Option<AbonneLoans>,
}

impl AbonnesScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        self.searching || self.form.is_some()
    }

    pub fn set_abonnes(&mut self, abonnes: Vec<Abonne>) {
        self.view.set_records(abonnes);
        self.sync_table();
    }

    pub fn sync_table(&mut self) {
        let count = self.view.visible().len();
        self.table.set_item_count(count);
    }

    pub fn selected(&self) -> Option<&Abonne> {
        let rows = self.view.visible();
        self.table.selected_in(&rows)
    }

    pub fn open_form(&mut self, abonne: Option<&Abonne>) {
        let values = abonne.map(AbonneForm::from_abonne).unwrap_or_default();
        let title = if abonne.is_some() {
            "Modifier l'abonné"
        } else {
            "Nouvel abonné"
        };
        self.form = Some(EditForm {
            form: abonne_form(title, &values),
            id: abonne.map(|a| a.id.clone()),
        });
    }

    /// Open the loans popup with freshly derived statuses
    pub fn show_loans(&mut self, abonne_id: &str, mut loans: Vec<Emprunt>, now: DateTime<Utc>) {
        loan_status::refresh_statuses(&mut loans, now);
        let name = self
            .view
            .find(abonne_id)
            .map(Abonne::full_name)
            .unwrap_or_else(|| abonne_id.to_string());
        self.loans = Some(AbonneLoans {
            abonne_id: abonne_id.to_string(),
            name,
            loans,
        });
    }

    /// Re-derive the statuses shown in the loans popup, if open
    pub fn refresh_loan_statuses(&mut self, now: DateTime<Utc>) -> usize {
        self.loans
            .as_mut()
            .map_or(0, |popup| loan_status::refresh_statuses(&mut popup.loans, now))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        if self.loans.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('l')) {
                self.loans = None;
            }
            return ScreenAction::None;
        }

        if let Some(edit) = &mut self.form {
            return match handle_form_key(&mut edit.form, key) {
                FormKey::Submit => {
                    let id = edit.id.clone();
                    match read_abonne_form(&edit.form)
                        .submit(|payload| ApiRequest::SaveAbonne { id, payload })
                    {
                        Ok(request) => {
                            self.form = None;
                            ScreenAction::Request(request)
                        }
                        Err(errors) => {
                            edit.form.set_errors(&errors);
                            ScreenAction::SetError(format!("Subscriber rejected: {}", errors))
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
        if let Some(sort_key) = digit_key(key, &AbonneSortKey::ALL) {
            self.view.request_sort(sort_key);
            return ScreenAction::None;
        }

        match key.code {
            KeyCode::Char('/') => {
                self.searching = true;
                ScreenAction::None
            }
            KeyCode::Char('a') => {
                self.open_form(None);
                ScreenAction::None
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                let selected = self.selected().cloned();
                match selected {
                    Some(abonne) => {
                        self.open_form(Some(&abonne));
                        ScreenAction::None
                    }
                    None => ScreenAction::SetError("No subscriber selected".to_string()),
                }
            }
            KeyCode::Char('l') => match self.selected() {
                Some(abonne) => ScreenAction::Request(ApiRequest::LoadAbonneLoans {
                    abonne_id: abonne.id.clone(),
                }),
                None => ScreenAction::SetError("No subscriber selected".to_string()),
            },
            KeyCode::Char('d') | KeyCode::Delete => match self.selected() {
                Some(abonne) => ScreenAction::Confirm {
                    message: format!("Delete subscriber {}?", abonne.full_name()),
                    request: ApiRequest::DeleteAbonne {
                        id: abonne.id.clone(),
                    },
                },
                None => ScreenAction::SetError("No subscriber selected".to_string()),
            },
            KeyCode::Char('p') => ScreenAction::Export(ExportFormat::Pdf),
            KeyCode::Char('c') => ScreenAction::Export(ExportFormat::Csv),
            KeyCode::Char('r') | KeyCode::F(5) => ScreenAction::Request(ApiRequest::LoadAbonnes),
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
            None,
            visible.len(),
            self.view.records().len(),
        );

        let header = AbonneSortKey::ALL
            .iter()
            .enumerate()
            .map(|(i, key)| sort_header(i, key.label(), *key, &self.view.sort))
            .collect();
        let rows: Vec<Row<'static>> = visible.iter().map(|a| abonne_row(a)).collect();
        let widths = [
            Constraint::Percentage(16),
            Constraint::Percentage(14),
            Constraint::Percentage(26),
            Constraint::Percentage(16),
            Constraint::Percentage(18),
            Constraint::Percentage(10),
        ];

        let focused = !self.is_editing() && self.loans.is_none();
        self.table.render(
            f,
            chunks[1],
            "Abonnés".to_string(),
            header,
            rows,
            &widths,
            focused,
        );

        if let Some(edit) = &self.form {
            edit.form.render(f, area);
        }
        if let Some(loans) = &self.loans {
            render_loans_popup(f, area, loans);
        }
    }
}

fn abonne_row(abonne: &Abonne) -> Row<'static> {
    Row::new(vec![
        Cell::from(abonne.nom.clone()),
        Cell::from(abonne.prenom.clone()),
        Cell::from(abonne.email.clone()),
        Cell::from(abonne.telephone.clone()),
        Cell::from(display_datetime(abonne.date_inscription)),
        Cell::from(abonne.active_loan_count().to_string()),
    ])
}

fn render_loans_popup(f: &mut Frame, area: Rect, loans: &AbonneLoans) {
    let popup = centered_rect(80, 60, area);
    f.render_widget(Clear, popup);

    let rows: Vec<Row> = loans
        .loans
        .iter()
        .map(|e| {
            Row::new(vec![
                Cell::from(e.document_title().to_string()),
                Cell::from(display_datetime(e.date_emprunt)),
                Cell::from(display_datetime(e.date_retour_prevue)),
                Cell::from(display_datetime(e.date_retour_effective)),
                Cell::from(e.statut.label()).style(Styles::loan_status(e.statut.into())),
            ])
        })
        .collect();

    let header = Row::new(vec![
        "Document",
        "Emprunt",
        "Retour prévu",
        "Retour effectif",
        "Statut",
    ])
    .style(Styles::header());

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(32),
            Constraint::Percentage(17),
            Constraint::Percentage(17),
            Constraint::Percentage(17),
            Constraint::Percentage(17),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(format!(
                "Emprunts de {} ({}) - Esc: fermer",
                loans.name,
                loans.loans.len()
            ))
            .borders(Borders::ALL)
            .border_style(Styles::active_border()),
    );
    f.render_widget(table, popup);
}

fn abonne_form(title: &str, values: &AbonneForm) -> Form {
    Form::new(
        title,
        vec![
            FormField::text("nom", "Nom").with_value(&values.nom),
            FormField::text("prenom", "Prénom").with_value(&values.prenom),
            FormField::text("email", "Email").with_value(&values.email),
            FormField::text("telephone", "Téléphone").with_value(&values.telephone),
            FormField::text("adresse", "Adresse").with_value(&values.adresse),
        ],
    )
}

fn read_abonne_form(form: &Form) -> AbonneForm {
    AbonneForm {
        nom: form.value("nom"),
        prenom: form.value("prenom"),
        email: form.value("email"),
        telephone: form.value("telephone"),
        adresse: form.value("adresse"),
    }
}
