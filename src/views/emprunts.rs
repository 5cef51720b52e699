use std::borrow::Cow;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::parse_key;
use crate::api::{ApiError, LibraryApi};
use crate::listing::{
    filter_records, sort_records, Searchable, SortDirection, SortState, SortValue, Sortable,
};
use crate::loan_status;
use crate::models::{Emprunt, EmpruntPayload, LoanStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmpruntSortKey {
    Document,
    Abonne,
    DateEmprunt,
    DateRetourPrevue,
    DateRetourEffective,
    Statut,
}

impl EmpruntSortKey {
    pub const ALL: [EmpruntSortKey; 6] = [
        EmpruntSortKey::Document,
        EmpruntSortKey::Abonne,
        EmpruntSortKey::DateEmprunt,
        EmpruntSortKey::DateRetourPrevue,
        EmpruntSortKey::DateRetourEffective,
        EmpruntSortKey::Statut,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EmpruntSortKey::Document => "Document",
            EmpruntSortKey::Abonne => "Abonné",
            EmpruntSortKey::DateEmprunt => "Emprunt",
            EmpruntSortKey::DateRetourPrevue => "Retour prévu",
            EmpruntSortKey::DateRetourEffective => "Retour effectif",
            EmpruntSortKey::Statut => "Statut",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        parse_key(
            value,
            &[
                (EmpruntSortKey::Document, "document|titre|title"),
                (EmpruntSortKey::Abonne, "abonne|abonné|member"),
                (EmpruntSortKey::DateEmprunt, "date_emprunt|emprunt|date"),
                (EmpruntSortKey::DateRetourPrevue, "date_retour_prevue|prevue|due"),
                (EmpruntSortKey::DateRetourEffective, "date_retour_effective|effective|returned"),
                (EmpruntSortKey::Statut, "statut|status"),
            ],
        )
    }
}

/// Status filter of the loans list; `None` shows every loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFilter(pub Option<LoanStatus>);

impl StatusFilter {
    pub fn label(&self) -> &'static str {
        match self.0 {
            None => "Tous",
            Some(status) => status.label(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tous" | "all" => Some(StatusFilter(None)),
            other => LoanStatus::parse(other).map(|s| StatusFilter(Some(s))),
        }
    }

    /// Tous -> en cours -> en retard -> retourné -> Tous
    pub fn next(&self) -> Self {
        let next = match self.0 {
            None => Some(LoanStatus::EnCours),
            Some(LoanStatus::EnCours) => Some(LoanStatus::EnRetard),
            Some(LoanStatus::EnRetard) => Some(LoanStatus::Retourne),
            Some(LoanStatus::Retourne) => None,
        };
        StatusFilter(next)
    }

    pub fn matches(&self, emprunt: &Emprunt) -> bool {
        self.0.map_or(true, |status| emprunt.statut == status)
    }
}

impl Searchable for Emprunt {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.document_title()),
            Cow::Borrowed(self.abonne_nom()),
            Cow::Borrowed(self.abonne_prenom()),
            Cow::Borrowed(self.abonne_telephone()),
            Cow::Borrowed(self.statut.as_str()),
            Cow::Borrowed(self.statut.label()),
        ]
    }
}

impl Sortable for Emprunt {
    type Key = EmpruntSortKey;

    fn sort_value(&self, key: EmpruntSortKey) -> SortValue {
        match key {
            EmpruntSortKey::Document => SortValue::text(self.document_title()),
            EmpruntSortKey::Abonne => SortValue::text(&self.abonne_full_name()),
            EmpruntSortKey::DateEmprunt => SortValue::timestamp(self.date_emprunt),
            EmpruntSortKey::DateRetourPrevue => SortValue::timestamp(self.date_retour_prevue),
            EmpruntSortKey::DateRetourEffective => SortValue::timestamp(self.date_retour_effective),
            EmpruntSortKey::Statut => SortValue::text(self.statut.as_str()),
        }
    }
}

/// Loans list state
#[derive(Debug, Clone)]
pub struct EmpruntsView {
    records: Vec<Emprunt>,
    pub query: String,
    pub status: StatusFilter,
    pub sort: SortState<EmpruntSortKey>,
}

impl Default for EmpruntsView {
    fn default() -> Self {
        Self::new()
    }
}

impl EmpruntsView {
    /// Empty list, most recent loans first
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            query: String::new(),
            status: StatusFilter::default(),
            sort: SortState::by(EmpruntSortKey::DateEmprunt, SortDirection::Desc),
        }
    }

    pub fn records(&self) -> &[Emprunt] {
        &self.records
    }

    /// Replace the list and derive statuses against `now`
    pub fn set_records(&mut self, mut records: Vec<Emprunt>, now: DateTime<Utc>) {
        loan_status::refresh_statuses(&mut records, now);
        debug!("Loans list replaced ({} records)", records.len());
        self.records = records;
    }

    pub fn find(&self, id: &str) -> Option<&Emprunt> {
        self.records.iter().find(|e| e.id == id)
    }

    pub fn visible(&self) -> Vec<&Emprunt> {
        let mut rows: Vec<&Emprunt> = filter_records(&self.records, &self.query)
            .into_iter()
            .filter(|e| self.status.matches(e))
            .collect();
        sort_records(&mut rows, &self.sort);
        rows
    }

    pub fn request_sort(&mut self, key: EmpruntSortKey) {
        self.sort.request(key);
    }

    /// Periodic recomputation of derived statuses; returns how many changed
    pub fn refresh_statuses(&mut self, now: DateTime<Utc>) -> usize {
        loan_status::refresh_statuses(&mut self.records, now)
    }

    /// Count loans per derived status
    pub fn count(&self, status: LoanStatus) -> usize {
        self.records.iter().filter(|e| e.statut == status).count()
    }

    /// Record a successful return locally
    pub fn apply_returned(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.records.iter_mut().find(|e| e.id == id) {
            Some(emprunt) => {
                emprunt.date_retour_effective = Some(now);
                emprunt.statut = LoanStatus::Retourne;
                true
            }
            None => false,
        }
    }

    pub fn apply_deleted(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|e| e.id != id);
        before != self.records.len()
    }

    pub async fn reload(&mut self, api: &dyn LibraryApi) -> Result<usize, ApiError> {
        let records = api.list_emprunts().await?;
        let count = records.len();
        self.set_records(records, Utc::now());
        Ok(count)
    }

    /// Replace the list with the backend's overdue loans
    pub async fn reload_overdue(&mut self, api: &dyn LibraryApi) -> Result<usize, ApiError> {
        let records = api.list_overdue_emprunts().await?;
        let count = records.len();
        self.set_records(records, Utc::now());
        Ok(count)
    }

    /// Replace the list with one subscriber's loans
    pub async fn reload_for_abonne(
        &mut self,
        api: &dyn LibraryApi,
        abonne_id: &str,
    ) -> Result<usize, ApiError> {
        let records = api.list_abonne_emprunts(abonne_id).await?;
        let count = records.len();
        self.set_records(records, Utc::now());
        Ok(count)
    }

    /// Register a new loan, then reload the list
    pub async fn create(&mut self, api: &dyn LibraryApi, payload: &EmpruntPayload) -> Result<String, ApiError> {
        let id = api.create_emprunt(payload).await?;
        info!(
            "Created loan {} (document {} for subscriber {})",
            id, payload.document_id, payload.abonne_id
        );
        self.reload(api).await?;
        Ok(id)
    }

    /// Register the return of a loan
    pub async fn register_return(&mut self, api: &dyn LibraryApi, id: &str) -> Result<(), ApiError> {
        api.return_emprunt(id).await?;
        info!("Returned loan {}", id);
        self.apply_returned(id, Utc::now());
        Ok(())
    }

    pub async fn delete(&mut self, api: &dyn LibraryApi, id: &str) -> Result<(), ApiError> {
        api.delete_emprunt(id).await?;
        info!("Deleted loan {}", id);
        self.apply_deleted(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockLibraryApi;
    use crate::models::{AbonneSummary, DocumentSummary};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 18, 12, 0, 0).unwrap()
    }

    fn loan(id: &str, titre: &str, nom: &str, emprunt_days_ago: i64, due_in_days: i64) -> Emprunt {
        Emprunt {
            id: id.to_string(),
            abonne_id: format!("ab-{}", nom),
            document_id: format!("doc-{}", id),
            date_emprunt: Some(now() - Duration::days(emprunt_days_ago)),
            date_retour_prevue: Some(now() + Duration::days(due_in_days)),
            date_retour_effective: None,
            statut: LoanStatus::EnCours,
            document: Some(DocumentSummary {
                titre: titre.to_string(),
                auteur: String::new(),
            }),
            abonne: Some(AbonneSummary {
                nom: nom.to_string(),
                prenom: "Jean".to_string(),
                telephone: "0600000000".to_string(),
                email: String::new(),
            }),
        }
    }

    fn view() -> EmpruntsView {
        let mut view = EmpruntsView::new();
        view.set_records(
            vec![
                loan("e1", "Le Petit Prince", "Dupont", 20, -6),
                loan("e2", "Heat", "Martin", 3, 11),
                loan("e3", "Abbey Road", "Bernard", 10, 4),
            ],
            now(),
        );
        view
    }

    fn ids(rows: &[&Emprunt]) -> Vec<String> {
        rows.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_default_order_is_most_recent_first() {
        let view = view();
        assert_eq!(ids(&view.visible()), vec!["e2", "e3", "e1"]);
    }

    #[test]
    fn test_statuses_are_derived_on_load() {
        let view = view();
        assert_eq!(view.find("e1").map(|e| e.statut), Some(LoanStatus::EnRetard));
        assert_eq!(view.count(LoanStatus::EnCours), 2);
        assert_eq!(view.count(LoanStatus::EnRetard), 1);
    }

    #[test]
    fn test_status_filter_and_search() {
        let mut view = view();
        view.status = StatusFilter(Some(LoanStatus::EnRetard));
        assert_eq!(ids(&view.visible()), vec!["e1"]);

        view.status = StatusFilter::default();
        view.query = "en_retard".to_string();
        assert_eq!(ids(&view.visible()), vec!["e1"]);

        view.query = "martin".to_string();
        assert_eq!(ids(&view.visible()), vec!["e2"]);

        view.query = "abbey".to_string();
        assert_eq!(ids(&view.visible()), vec!["e3"]);
    }

    #[test]
    fn test_nested_sort_keys() {
        let mut view = view();
        view.request_sort(EmpruntSortKey::Document);
        assert_eq!(ids(&view.visible()), vec!["e3", "e2", "e1"]);
        view.request_sort(EmpruntSortKey::Abonne);
        assert_eq!(ids(&view.visible()), vec!["e3", "e1", "e2"]);
    }

    #[test]
    fn test_refresh_marks_newly_overdue() {
        let mut view = view();
        assert_eq!(view.refresh_statuses(now()), 0);
        assert_eq!(view.refresh_statuses(now() + Duration::days(5)), 1);
        assert_eq!(view.find("e3").map(|e| e.statut), Some(LoanStatus::EnRetard));
    }

    #[test]
    fn test_status_filter_cycle() {
        let mut filter = StatusFilter::default();
        let mut labels = Vec::new();
        for _ in 0..4 {
            labels.push(filter.label());
            filter = filter.next();
        }
        assert_eq!(labels, vec!["Tous", "En cours", "En retard", "Retourné"]);
        assert_eq!(filter, StatusFilter::default());
        assert_eq!(StatusFilter::parse("retourne"), Some(StatusFilter(Some(LoanStatus::Retourne))));
    }

    #[tokio::test]
    async fn test_return_marks_loan_returned() {
        let mut api = MockLibraryApi::new();
        api.expect_return_emprunt()
            .withf(|id| id == "e1")
            .times(1)
            .returning(|_| Ok(()));

        let mut view = view();
        view.register_return(&api, "e1").await.unwrap();
        let returned = view.find("e1").unwrap();
        assert_eq!(returned.statut, LoanStatus::Retourne);
        assert!(returned.date_retour_effective.is_some());
    }

    #[tokio::test]
    async fn test_failed_return_leaves_loan_untouched() {
        let mut api = MockLibraryApi::new();
        api.expect_return_emprunt().times(1).returning(|_| {
            Err(ApiError::Status {
                status_code: 400,
                message: "Cet emprunt est déjà terminé".to_string(),
            })
        });

        let mut view = view();
        let before = view.find("e2").cloned();
        assert!(view.register_return(&api, "e2").await.is_err());
        assert_eq!(view.find("e2").cloned(), before);
    }

    #[tokio::test]
    async fn test_create_reloads_list() {
        let mut api = MockLibraryApi::new();
        api.expect_create_emprunt()
            .withf(|payload| payload.abonne_id == "a1" && payload.document_id == "d1")
            .times(1)
            .returning(|_| Ok("e9".to_string()));
        api.expect_list_emprunts()
            .times(1)
            .returning(|| Ok(vec![loan("e9", "Heat", "Dupont", 0, 14)]));

        let mut view = EmpruntsView::new();
        let payload = EmpruntPayload {
            abonne_id: "a1".to_string(),
            document_id: "d1".to_string(),
        };
        assert_eq!(view.create(&api, &payload).await.unwrap(), "e9");
        assert_eq!(view.records().len(), 1);
    }
}
