use std::borrow::Cow;

use tracing::{debug, info};

use super::parse_key;
use crate::api::{ApiError, LibraryApi};
use crate::listing::{filter_records, sort_records, Searchable, SortState, SortValue, Sortable};
use crate::models::{Abonne, AbonnePayload, Emprunt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbonneSortKey {
    Nom,
    Prenom,
    Email,
    Telephone,
    DateInscription,
    Emprunts,
}

impl AbonneSortKey {
    pub const ALL: [AbonneSortKey; 6] = [
        AbonneSortKey::Nom,
        AbonneSortKey::Prenom,
        AbonneSortKey::Email,
        AbonneSortKey::Telephone,
        AbonneSortKey::DateInscription,
        AbonneSortKey::Emprunts,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AbonneSortKey::Nom => "Nom",
            AbonneSortKey::Prenom => "Prénom",
            AbonneSortKey::Email => "Email",
            AbonneSortKey::Telephone => "Téléphone",
            AbonneSortKey::DateInscription => "Inscription",
            AbonneSortKey::Emprunts => "Emprunts",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        parse_key(
            value,
            &[
                (AbonneSortKey::Nom, "nom|name"),
                (AbonneSortKey::Prenom, "prenom|prénom|first_name"),
                (AbonneSortKey::Email, "email"),
                (AbonneSortKey::Telephone, "telephone|téléphone|phone"),
                (AbonneSortKey::DateInscription, "date_inscription|inscription|date"),
                (AbonneSortKey::Emprunts, "emprunts|loans"),
            ],
        )
    }
}

impl Searchable for Abonne {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.nom.as_str()),
            Cow::Borrowed(self.email.as_str()),
            Cow::Borrowed(self.telephone.as_str()),
        ]
    }
}

impl Sortable for Abonne {
    type Key = AbonneSortKey;

    fn sort_value(&self, key: AbonneSortKey) -> SortValue {
        match key {
            AbonneSortKey::Nom => SortValue::text(&self.full_name()),
            AbonneSortKey::Prenom => SortValue::text(&self.prenom),
            AbonneSortKey::Email => SortValue::text(&self.email),
            AbonneSortKey::Telephone => SortValue::text(&self.telephone),
            AbonneSortKey::DateInscription => SortValue::timestamp(self.date_inscription),
            AbonneSortKey::Emprunts => SortValue::Number(self.active_loan_count() as i64),
        }
    }
}

/// Subscribers list state
#[derive(Debug, Clone)]
pub struct AbonnesView {
    records: Vec<Abonne>,
    pub query: String,
    pub sort: SortState<AbonneSortKey>,
}

impl Default for AbonnesView {
    fn default() -> Self {
        Self::new()
    }
}

impl AbonnesView {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            query: String::new(),
            sort: SortState::unsorted(),
        }
    }

    pub fn records(&self) -> &[Abonne] {
        &self.records
    }

    pub fn set_records(&mut self, records: Vec<Abonne>) {
        debug!("Subscribers list replaced ({} records)", records.len());
        self.records = records;
    }

    pub fn find(&self, id: &str) -> Option<&Abonne> {
        self.records.iter().find(|a| a.id == id)
    }

    pub fn visible(&self) -> Vec<&Abonne> {
        let mut rows = filter_records(&self.records, &self.query);
        sort_records(&mut rows, &self.sort);
        rows
    }

    /// Subscribers whose "nom prenom" contains `query`, for the loan picker
    pub fn matching_name(&self, query: &str) -> Vec<&Abonne> {
        let needle = query.to_lowercase();
        self.records
            .iter()
            .filter(|a| a.full_name().to_lowercase().contains(&needle))
            .collect()
    }

    pub fn request_sort(&mut self, key: AbonneSortKey) {
        self.sort.request(key);
    }

    pub fn apply_deleted(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|a| a.id != id);
        before != self.records.len()
    }

    pub async fn reload(&mut self, api: &dyn LibraryApi) -> Result<usize, ApiError> {
        let records = api.list_abonnes().await?;
        let count = records.len();
        self.set_records(records);
        Ok(count)
    }

    /// Create (`id` = None) or update a subscriber, then reload the list
    pub async fn save(
        &mut self,
        api: &dyn LibraryApi,
        id: Option<&str>,
        payload: &AbonnePayload,
    ) -> Result<String, ApiError> {
        let saved_id = match id {
            Some(id) => {
                api.update_abonne(id, payload).await?;
                info!("Updated subscriber {}", id);
                id.to_string()
            }
            None => {
                let id = api.create_abonne(payload).await?;
                info!("Created subscriber {} ({} {})", id, payload.nom, payload.prenom);
                id
            }
        };
        self.reload(api).await?;
        Ok(saved_id)
    }

    pub async fn delete(&mut self, api: &dyn LibraryApi, id: &str) -> Result<(), ApiError> {
        api.delete_abonne(id).await?;
        info!("Deleted subscriber {}", id);
        self.apply_deleted(id);
        Ok(())
    }

    /// Loan history of one subscriber; does not touch the list
    pub async fn loans_of(&self, api: &dyn LibraryApi, id: &str) -> Result<Vec<Emprunt>, ApiError> {
        api.list_abonne_emprunts(id).await
    }
}
