//! Main TUI application state and logic

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame, Terminal,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use super::components::{ConfirmDialog, ConfirmOutcome, StatusDisplay};
use super::events::{AppEvent, Entity};
use super::screens::*;
use super::traits::{ApiRequest, ScreenAction};
use super::ui::{centered_rect, Styles};
use crate::api::{ApiError, LibraryApi};
use crate::config::Config;
use crate::export::{self, ExportFormat, ExportTable};
use crate::models::{DocumentQuery, LoanStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(8);

/// Application screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Documents,
    Abonnes,
    Emprunts,
    Help,
}

impl Screen {
    pub const ORDER: [Screen; 5] = [
        Screen::Dashboard,
        Screen::Documents,
        Screen::Abonnes,
        Screen::Emprunts,
        Screen::Help,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Dashboard => "Tableau de bord",
            Screen::Documents => "Documents",
            Screen::Abonnes => "Abonnés",
            Screen::Emprunts => "Emprunts",
            Screen::Help => "Aide",
        }
    }

    fn index(&self) -> usize {
        Self::ORDER.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> Screen {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    pub fn previous(&self) -> Screen {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Main TUI application state
pub struct App {
    /// Current active screen
    pub current_screen: Screen,
    /// Previous screen for navigation
    pub previous_screen: Option<Screen>,
    /// Application configuration
    pub config: Config,
    api: Arc<dyn LibraryApi>,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,

    // Screen states
    pub dashboard: DashboardScreen,
    pub documents: DocumentsScreen,
    pub abonnes: AbonnesScreen,
    pub emprunts: EmpruntsScreen,
    pub help: HelpScreen,

    // Global application state
    pub should_quit: bool,
    pub show_help_popup: bool,
    pub status: StatusDisplay,
    pub confirm: Option<ConfirmDialog>,
    last_status_refresh: Instant,
}

impl App {
    /// Create a new TUI application
    pub fn new(config: Config, api: Arc<dyn LibraryApi>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            current_screen: Screen::Dashboard,
            previous_screen: None,
            config,
            api,
            events_tx,
            events_rx,

            dashboard: DashboardScreen::new(),
            documents: DocumentsScreen::new(),
            abonnes: AbonnesScreen::new(),
            emprunts: EmpruntsScreen::new(),
            help: HelpScreen::new(),

            should_quit: false,
            show_help_popup: false,
            status: StatusDisplay::new().with_auto_clear(STATUS_MESSAGE_TIMEOUT),
            confirm: None,
            last_status_refresh: Instant::now(),
        }
    }

    /// Run the main application loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        self.dispatch(ApiRequest::LoadAll);

        loop {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(POLL_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }

            while let Ok(event) = self.events_rx.try_recv() {
                self.apply_event(event);
            }

            if self.last_status_refresh.elapsed() >= self.config.status_refresh_interval() {
                self.refresh_loan_statuses(Utc::now());
                self.last_status_refresh = Instant::now();
            }
            self.status.expire(Local::now());

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Whether the current screen has a text input or popup owning the keyboard
    pub fn is_editing(&self) -> bool {
        match self.current_screen {
            Screen::Documents => self.documents.is_editing(),
            Screen::Abonnes => self.abonnes.is_editing(),
            Screen::Emprunts => self.emprunts.is_editing(),
            Screen::Dashboard | Screen::Help => false,
        }
    }

    /// Handle keyboard input events
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if let Some(dialog) = &self.confirm {
            match dialog.handle_key(key) {
                ConfirmOutcome::Confirmed(request) => {
                    self.confirm = None;
                    self.dispatch(request);
                }
                ConfirmOutcome::Cancelled => {
                    self.confirm = None;
                    self.status.set_info("Cancelled".to_string());
                }
                ConfirmOutcome::Pending => {}
            }
            return;
        }

        if key.code == KeyCode::F(1) {
            self.show_help_popup = !self.show_help_popup;
            return;
        }
        if self.show_help_popup {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
                self.show_help_popup = false;
            }
            return;
        }

        // Global shortcuts, unless a text input is active
        if !self.is_editing() {
            match key.code {
                KeyCode::Char('?') => {
                    self.show_help_popup = true;
                    return;
                }
                KeyCode::Char('q') => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Tab => {
                    self.navigate_to_screen(self.current_screen.next());
                    return;
                }
                KeyCode::BackTab => {
                    self.navigate_to_screen(self.current_screen.previous());
                    return;
                }
                _ => {}
            }
        }

        let action = match self.current_screen {
            Screen::Dashboard => self.dashboard.handle_key(key),
            Screen::Documents => self.documents.handle_key(key),
            Screen::Abonnes => self.abonnes.handle_key(key),
            Screen::Emprunts => self.emprunts.handle_key(key),
            Screen::Help => self.help.handle_key(key),
        };
        self.apply_action(action);
    }

    fn apply_action(&mut self, action: ScreenAction) {
        match action {
            ScreenAction::NavigateTo(screen) => self.navigate_to_screen(screen),
            ScreenAction::Quit => self.should_quit = true,
            ScreenAction::SetStatus(message) => self.status.set_info(message),
            ScreenAction::SetError(message) => self.status.set_error(message),
            ScreenAction::Request(request) => self.dispatch(request),
            ScreenAction::Confirm { message, request } => {
                self.confirm = Some(ConfirmDialog::new(message, request));
            }
            ScreenAction::Export(format) => self.export_current(format),
            ScreenAction::OpenLoanPicker => {
                self.emprunts.open_picker(
                    self.abonnes.view.records().to_vec(),
                    self.documents.view.records().to_vec(),
                );
            }
            ScreenAction::None => {}
        }
    }

    /// Run a backend call in the background; the result comes back as an [`AppEvent`]
    pub fn dispatch(&mut self, request: ApiRequest) {
        debug!("Dispatching {:?}", request);
        self.status.set_loading(describe(&request).to_string());

        let api = Arc::clone(&self.api);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            for event in perform(api.as_ref(), request).await {
                // The receiver is gone once the UI has exited
                let _ = tx.send(event);
            }
        });
    }

    /// Apply the result of a background request
    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::StatsLoaded(Ok(stats)) => {
                self.dashboard.set_stats(stats);
                self.status.set_success("Statistics updated".to_string());
            }
            AppEvent::DocumentsLoaded(Ok(documents)) => {
                let count = documents.len();
                self.documents.set_documents(documents);
                self.status.set_success(format!("{} documents loaded", count));
            }
            AppEvent::AbonnesLoaded(Ok(abonnes)) => {
                let count = abonnes.len();
                self.abonnes.set_abonnes(abonnes);
                self.status.set_success(format!("{} subscribers loaded", count));
            }
            AppEvent::EmpruntsLoaded(Ok(emprunts)) => {
                let count = emprunts.len();
                self.emprunts.set_emprunts(emprunts, Utc::now());
                self.status.set_success(format!("{} loans loaded", count));
            }
            AppEvent::AbonneLoansLoaded {
                abonne_id,
                result: Ok(loans),
            } => {
                self.abonnes.show_loans(&abonne_id, loans, Utc::now());
                self.status.clear();
            }
            AppEvent::Saved {
                entity,
                created,
                result: Ok(id),
            } => {
                let verb = if created { "created" } else { "updated" };
                info!("{} {} {}", entity.label(), id, verb);
                self.status.set_success(format!("{} {}", entity.label(), verb));
                for request in reloads_after(entity) {
                    self.dispatch(request);
                }
            }
            AppEvent::Deleted {
                entity,
                id,
                result: Ok(()),
            } => {
                match entity {
                    Entity::Document => {
                        self.documents.view.apply_deleted(&id);
                        self.documents.sync_table();
                    }
                    Entity::Abonne => {
                        self.abonnes.view.apply_deleted(&id);
                        self.abonnes.sync_table();
                    }
                    Entity::Emprunt => {
                        self.emprunts.view.apply_deleted(&id);
                        self.emprunts.sync_table();
                    }
                }
                self.status.set_success(format!("{} deleted", entity.label()));
                self.dispatch(ApiRequest::LoadStats);
            }
            AppEvent::Returned { id, result: Ok(()) } => {
                self.emprunts.view.apply_returned(&id, Utc::now());
                self.emprunts.sync_table();
                self.status.set_success("Return registered".to_string());
                // The document is available again
                self.dispatch(ApiRequest::LoadDocuments);
                self.dispatch(ApiRequest::LoadStats);
            }

            // Failures keep the previous state; only the message changes
            AppEvent::StatsLoaded(Err(message))
            | AppEvent::DocumentsLoaded(Err(message))
            | AppEvent::AbonnesLoaded(Err(message))
            | AppEvent::EmpruntsLoaded(Err(message))
            | AppEvent::AbonneLoansLoaded {
                result: Err(message),
                ..
            }
            | AppEvent::Saved {
                result: Err(message),
                ..
            }
            | AppEvent::Deleted {
                result: Err(message),
                ..
            }
            | AppEvent::Returned {
                result: Err(message),
                ..
            } => self.status.set_error(message),
        }
    }

    /// Periodic re-derivation of the displayed loan statuses
    pub fn refresh_loan_statuses(&mut self, now: DateTime<Utc>) -> usize {
        let changed = self.emprunts.view.refresh_statuses(now);
        if changed > 0 {
            self.emprunts.sync_table();
        }
        let changed = changed + self.abonnes.refresh_loan_statuses(now);
        if changed > 0 {
            debug!("{} loan statuses changed on refresh", changed);
        }
        changed
    }

    /// Export the visible rows of the current list screen
    fn export_current(&mut self, format: ExportFormat) {
        let table: ExportTable = match self.current_screen {
            Screen::Documents => export::documents_table(self.documents.view.visible()),
            Screen::Abonnes => export::abonnes_table(self.abonnes.view.visible()),
            Screen::Emprunts => export::emprunts_table(self.emprunts.view.visible()),
            Screen::Dashboard | Screen::Help => return,
        };
        if table.rows.is_empty() {
            self.status.set_warning("Nothing to export".to_string());
            return;
        }

        match export::export_table(&table, format, &self.config.export_dir, Local::now().date_naive()) {
            Ok(path) => self.status.set_success(format!(
                "Exported {} rows to {}",
                table.rows.len(),
                path.display()
            )),
            Err(e) => {
                error!("Export failed: {:#}", e);
                self.status.set_error(format!("Export failed: {:#}", e));
            }
        }
    }

    /// Draw the UI
    pub fn draw(&mut self, f: &mut Frame) {
        let size = f.size();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(size);

        let tabs = Tabs::new(Screen::ORDER.iter().map(|s| s.title()).collect::<Vec<_>>())
            .select(self.current_screen.index())
            .block(Block::default().borders(Borders::ALL).title("Médiathèque"))
            .highlight_style(Styles::title());
        f.render_widget(tabs, chunks[0]);

        match self.current_screen {
            Screen::Dashboard => {
                let counts: Vec<(LoanStatus, usize)> = LoanStatus::ALL
                    .iter()
                    .map(|s| (*s, self.emprunts.view.count(*s)))
                    .collect();
                self.dashboard.draw(f, chunks[1], &counts);
            }
            Screen::Documents => self.documents.draw(f, chunks[1]),
            Screen::Abonnes => self.abonnes.draw(f, chunks[1]),
            Screen::Emprunts => self.emprunts.draw(f, chunks[1]),
            Screen::Help => self.help.draw(f, chunks[1]),
        }

        let hint = format!(
            "{} | Tab: screens | /: search | F1/?: help | q: quit",
            self.current_screen.title()
        );
        self.status.render(f, chunks[2], &hint);

        if let Some(dialog) = &self.confirm {
            dialog.render(f, size);
        }
        if self.show_help_popup {
            self.draw_help_popup(f, size);
        }
    }

    /// Draw help popup with context-sensitive shortcuts
    fn draw_help_popup(&self, f: &mut Frame, area: Rect) {
        let popup_area = centered_rect(70, 70, area);
        f.render_widget(Clear, popup_area);

        let help_popup = Paragraph::new(self.get_context_help()).block(
            Block::default()
                .title("Help - Context Shortcuts")
                .borders(Borders::ALL)
                .border_style(Styles::active_border()),
        );
        f.render_widget(help_popup, popup_area);
    }

    /// Get context-sensitive help content
    fn get_context_help(&self) -> String {
        let global_help = "Global Shortcuts:\n\
            Tab / Shift+Tab - Switch screen\n\
            Esc - Back\n\
            q - Quit application\n\
            F1 / ? - Toggle this help\n\n";

        let list_help = "\n\
            ↑/↓ - Navigate rows\n\
            / - Search\n\
            1-6 - Sort by column (again to reverse)\n\
            d - Delete (with confirmation)\n\
            p / c - Export PDF / CSV\n\
            F5 - Reload";

        let screen_help = match self.current_screen {
            Screen::Dashboard => "Dashboard:\n\
                1/2/3 - Documents / Abonnés / Emprunts\n\
                4 - Help\n\
                r / F5 - Refresh everything"
                .to_string(),
            Screen::Documents => format!(
                "Documents:\n\
                a - Add, e/Enter - Edit\n\
                f - Cycle availability filter{}",
                list_help
            ),
            Screen::Abonnes => format!(
                "Abonnés:\n\
                a - Add, e/Enter - Edit\n\
                l - Show loans{}",
                list_help
            ),
            Screen::Emprunts => format!(
                "Emprunts:\n\
                n - New loan\n\
                r - Register return\n\
                f - Cycle status filter{}",
                list_help
            ),
            Screen::Help => "Help Screen:\n\
                ↑/↓ - Switch help sections"
                .to_string(),
        };

        format!("{}{}", global_help, screen_help)
    }

    /// Navigate to a specific screen
    pub fn navigate_to_screen(&mut self, screen: Screen) {
        if screen == self.current_screen {
            return;
        }
        self.previous_screen = Some(self.current_screen);
        self.current_screen = screen;
    }
}

fn describe(request: &ApiRequest) -> &'static str {
    match request {
        ApiRequest::LoadAll => "Loading data...",
        ApiRequest::LoadStats => "Loading statistics...",
        ApiRequest::LoadDocuments => "Loading documents...",
        ApiRequest::LoadAbonnes => "Loading subscribers...",
        ApiRequest::LoadEmprunts => "Loading loans...",
        ApiRequest::LoadAbonneLoans { .. } => "Loading the subscriber's loans...",
        ApiRequest::SaveDocument { .. } => "Saving document...",
        ApiRequest::SaveAbonne { .. } => "Saving subscriber...",
        ApiRequest::CreateEmprunt { .. } => "Registering loan...",
        ApiRequest::ReturnEmprunt { .. } => "Registering return...",
        ApiRequest::DeleteDocument { .. }
        | ApiRequest::DeleteAbonne { .. }
        | ApiRequest::DeleteEmprunt { .. } => "Deleting...",
    }
}

/// Lists to refresh once a record was saved
fn reloads_after(entity: Entity) -> Vec<ApiRequest> {
    match entity {
        Entity::Document => vec![ApiRequest::LoadDocuments, ApiRequest::LoadStats],
        Entity::Abonne => vec![ApiRequest::LoadAbonnes, ApiRequest::LoadStats],
        // A loan changes document availability and subscriber counters too
        Entity::Emprunt => vec![ApiRequest::LoadAll],
    }
}

fn failure(action: &str, err: ApiError) -> String {
    error!("{} failed: {}", action, err);
    format!("{} failed: {}", action, err)
}

/// Execute one request against the backend and describe the outcome as events
pub(crate) async fn perform(api: &dyn LibraryApi, request: ApiRequest) -> Vec<AppEvent> {
    match request {
        ApiRequest::LoadAll => {
            let query = DocumentQuery::default();
            let (stats, documents, abonnes, emprunts) = futures::join!(
                api.stats(),
                api.list_documents(&query),
                api.list_abonnes(),
                api.list_emprunts()
            );
            vec![
                AppEvent::StatsLoaded(stats.map_err(|e| failure("Loading statistics", e))),
                AppEvent::DocumentsLoaded(documents.map_err(|e| failure("Loading documents", e))),
                AppEvent::AbonnesLoaded(abonnes.map_err(|e| failure("Loading subscribers", e))),
                AppEvent::EmpruntsLoaded(emprunts.map_err(|e| failure("Loading loans", e))),
            ]
        }
        ApiRequest::LoadStats => vec![AppEvent::StatsLoaded(
            api.stats().await.map_err(|e| failure("Loading statistics", e)),
        )],
        ApiRequest::LoadDocuments => vec![AppEvent::DocumentsLoaded(
            api.list_documents(&DocumentQuery::default())
                .await
                .map_err(|e| failure("Loading documents", e)),
        )],
        ApiRequest::LoadAbonnes => vec![AppEvent::AbonnesLoaded(
            api.list_abonnes()
                .await
                .map_err(|e| failure("Loading subscribers", e)),
        )],
        ApiRequest::LoadEmprunts => vec![AppEvent::EmpruntsLoaded(
            api.list_emprunts()
                .await
                .map_err(|e| failure("Loading loans", e)),
        )],
        ApiRequest::LoadAbonneLoans { abonne_id } => {
            let result = api
                .list_abonne_emprunts(&abonne_id)
                .await
                .map_err(|e| failure("Loading the subscriber's loans", e));
            vec![AppEvent::AbonneLoansLoaded { abonne_id, result }]
        }
        ApiRequest::SaveDocument { id, payload } => {
            let created = id.is_none();
            let result = match id {
                Some(id) => api.update_document(&id, &payload).await.map(|_| id),
                None => api.create_document(&payload).await,
            };
            vec![AppEvent::Saved {
                entity: Entity::Document,
                created,
                result: result.map_err(|e| failure("Saving document", e)),
            }]
        }
        ApiRequest::SaveAbonne { id, payload } => {
            let created = id.is_none();
            let result = match id {
                Some(id) => api.update_abonne(&id, &payload).await.map(|_| id),
                None => api.create_abonne(&payload).await,
            };
            vec![AppEvent::Saved {
                entity: Entity::Abonne,
                created,
                result: result.map_err(|e| failure("Saving subscriber", e)),
            }]
        }
        ApiRequest::CreateEmprunt { payload } => vec![AppEvent::Saved {
            entity: Entity::Emprunt,
            created: true,
            result: api
                .create_emprunt(&payload)
                .await
                .map_err(|e| failure("Registering loan", e)),
        }],
        ApiRequest::ReturnEmprunt { id } => {
            let result = api
                .return_emprunt(&id)
                .await
                .map_err(|e| failure("Registering return", e));
            vec![AppEvent::Returned { id, result }]
        }
        ApiRequest::DeleteDocument { id } => {
            let result = api
                .delete_document(&id)
                .await
                .map_err(|e| failure("Deleting document", e));
            vec![AppEvent::Deleted {
                entity: Entity::Document,
                id,
                result,
            }]
        }
        ApiRequest::DeleteAbonne { id } => {
            let result = api
                .delete_abonne(&id)
                .await
                .map_err(|e| failure("Deleting subscriber", e));
            vec![AppEvent::Deleted {
                entity: Entity::Abonne,
                id,
                result,
            }]
        }
        ApiRequest::DeleteEmprunt { id } => {
            let result = api
                .delete_emprunt(&id)
                .await
                .map_err(|e| failure("Deleting loan", e));
            vec![AppEvent::Deleted {
                entity: Entity::Emprunt,
                id,
                result,
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockLibraryApi;
    use crate::models::{Document, DocumentType, Emprunt, Stats};
    use crate::tui::components::StatusType;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app(api: MockLibraryApi) -> App {
        let config = Config {
            export_dir: std::env::temp_dir(),
            ..Config::default()
        };
        App::new(config, Arc::new(api))
    }

    fn document(id: &str, titre: &str) -> Document {
        Document {
            id: id.to_string(),
            titre: titre.to_string(),
            auteur: "Saint-Exupéry".to_string(),
            doc_type: DocumentType::Book,
            isbn: "978".to_string(),
            date_publication: None,
            disponible: true,
            emprunts: Vec::new(),
        }
    }

    fn loan_due_soon(now: DateTime<Utc>) -> Emprunt {
        Emprunt {
            id: "e1".to_string(),
            abonne_id: "a1".to_string(),
            document_id: "d1".to_string(),
            date_emprunt: Some(now - ChronoDuration::days(10)),
            date_retour_prevue: Some(now + ChronoDuration::hours(1)),
            date_retour_effective: None,
            statut: LoanStatus::EnCours,
            document: None,
            abonne: None,
        }
    }

    #[test]
    fn test_screen_cycle() {
        assert_eq!(Screen::Dashboard.next(), Screen::Documents);
        assert_eq!(Screen::Help.next(), Screen::Dashboard);
        assert_eq!(Screen::Dashboard.previous(), Screen::Help);
    }

    #[test]
    fn test_q_quits_only_outside_text_input() {
        let mut app = app(MockLibraryApi::new());
        app.navigate_to_screen(Screen::Documents);

        app.handle_key_event(key(KeyCode::Char('/')));
        app.handle_key_event(key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        assert_eq!(app.documents.view.query, "q");

        app.handle_key_event(key(KeyCode::Enter));
        app.handle_key_event(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_tab_switches_screens() {
        let mut app = app(MockLibraryApi::new());
        app.handle_key_event(key(KeyCode::Tab));
        assert_eq!(app.current_screen, Screen::Documents);
        app.handle_key_event(key(KeyCode::BackTab));
        assert_eq!(app.current_screen, Screen::Dashboard);
        assert_eq!(app.previous_screen, Some(Screen::Documents));
    }

    #[test]
    fn test_failed_load_keeps_previous_records() {
        let mut app = app(MockLibraryApi::new());
        app.apply_event(AppEvent::DocumentsLoaded(Ok(vec![document("d1", "Vol de nuit")])));
        app.apply_event(AppEvent::DocumentsLoaded(Err("Loading documents failed".to_string())));

        assert_eq!(app.documents.view.records().len(), 1);
        assert!(app.status.is_error());
    }

    #[test]
    fn test_status_timer_marks_overdue_loans() {
        let mut app = app(MockLibraryApi::new());
        let now = Utc.with_ymd_and_hms(2024, 10, 18, 12, 0, 0).unwrap();
        app.emprunts.set_emprunts(vec![loan_due_soon(now)], now);
        assert_eq!(app.emprunts.view.count(LoanStatus::EnCours), 1);

        assert_eq!(app.refresh_loan_statuses(now + ChronoDuration::hours(2)), 1);
        assert_eq!(app.emprunts.view.count(LoanStatus::EnRetard), 1);
        assert_eq!(app.refresh_loan_statuses(now + ChronoDuration::hours(3)), 0);
    }

    #[test]
    fn test_status_timer_refreshes_open_subscriber_loans() {
        let mut app = app(MockLibraryApi::new());
        let now = Utc.with_ymd_and_hms(2024, 10, 18, 12, 0, 0).unwrap();
        app.abonnes.show_loans("a1", vec![loan_due_soon(now)], now);

        assert_eq!(app.refresh_loan_statuses(now + ChronoDuration::hours(2)), 1);
        let popup = app.abonnes.loans.as_ref().expect("popup open");
        assert_eq!(popup.loans[0].statut, LoanStatus::EnRetard);
    }

    #[test]
    fn test_export_of_empty_list_warns() {
        let mut app = app(MockLibraryApi::new());
        app.navigate_to_screen(Screen::Documents);
        app.handle_key_event(key(KeyCode::Char('c')));

        let message = app.status.get_current().expect("status message");
        assert_eq!(message.status_type, StatusType::Warning);
        assert_eq!(message.message, "Nothing to export");
    }

    #[tokio::test]
    async fn test_perform_delete_reports_backend_error() {
        let mut api = MockLibraryApi::new();
        api.expect_delete_document()
            .withf(|id| id == "d1")
            .times(1)
            .returning(|_| {
                Err(ApiError::Status {
                    status_code: 400,
                    message: "Document is currently borrowed".to_string(),
                })
            });

        let events = perform(&api, ApiRequest::DeleteDocument { id: "d1".to_string() }).await;
        match events.as_slice() {
            [AppEvent::Deleted {
                entity: Entity::Document,
                id,
                result: Err(message),
            }] => {
                assert_eq!(id, "d1");
                assert!(message.contains("Document is currently borrowed"));
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_perform_load_all_fetches_everything() {
        let mut api = MockLibraryApi::new();
        api.expect_stats().times(1).returning(|| {
            Ok(Stats {
                total_documents: 3,
                ..Stats::default()
            })
        });
        api.expect_list_documents()
            .times(1)
            .returning(|_| Ok(vec![document("d1", "Vol de nuit")]));
        api.expect_list_abonnes().times(1).returning(|| Ok(Vec::new()));
        api.expect_list_emprunts().times(1).returning(|| Ok(Vec::new()));

        let events = perform(&api, ApiRequest::LoadAll).await;
        assert_eq!(events.len(), 4);

        let mut app = app(MockLibraryApi::new());
        for event in events {
            app.apply_event(event);
        }
        assert_eq!(app.dashboard.stats.as_ref().map(|s| s.total_documents), Some(3));
        assert_eq!(app.documents.view.records().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_delete_runs_request_and_removes_row() {
        let mut api = MockLibraryApi::new();
        api.expect_delete_document()
            .withf(|id| id == "d1")
            .times(1)
            .returning(|_| Ok(()));
        api.expect_stats().returning(|| Ok(Stats::default()));

        let mut app = app(api);
        app.apply_event(AppEvent::DocumentsLoaded(Ok(vec![
            document("d1", "Vol de nuit"),
            document("d2", "Citadelle"),
        ])));
        app.navigate_to_screen(Screen::Documents);

        app.handle_key_event(key(KeyCode::Char('d')));
        assert!(app.confirm.is_some());
        app.handle_key_event(key(KeyCode::Char('y')));
        assert!(app.confirm.is_none());

        let event = app.events_rx.recv().await.expect("delete event");
        app.apply_event(event);
        let ids: Vec<&str> = app.documents.view.records().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d2"]);
    }

    #[test]
    fn test_cancelled_delete_does_nothing() {
        let mut app = app(MockLibraryApi::new());
        app.apply_event(AppEvent::DocumentsLoaded(Ok(vec![document("d1", "Vol de nuit")])));
        app.navigate_to_screen(Screen::Documents);

        app.handle_key_event(key(KeyCode::Char('d')));
        app.handle_key_event(key(KeyCode::Char('n')));
        assert!(app.confirm.is_none());
        assert_eq!(app.documents.view.records().len(), 1);
    }

    #[test]
    fn test_draw_every_screen() {
        let mut app = app(MockLibraryApi::new());
        app.apply_event(AppEvent::DocumentsLoaded(Ok(vec![document("d1", "Vol de nuit")])));
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).expect("terminal");

        for screen in Screen::ORDER {
            app.navigate_to_screen(screen);
            terminal.draw(|f| app.draw(f)).expect("draw");
        }

        app.navigate_to_screen(Screen::Documents);
        app.show_help_popup = true;
        terminal.draw(|f| app.draw(f)).expect("draw with popup");
        let buffer = terminal.backend().buffer();
        let text: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Vol de nuit"));
        assert!(text.contains("Help - Context Shortcuts"));
    }
}
