use std::borrow::Cow;

use tracing::{debug, info};

use super::parse_key;
use crate::api::{ApiError, LibraryApi};
use crate::listing::{filter_records, sort_records, Searchable, SortState, SortValue, Sortable};
use crate::models::{display_date, Document, DocumentPayload, DocumentQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSortKey {
    Titre,
    Auteur,
    Type,
    Isbn,
    DatePublication,
    Disponible,
}

impl DocumentSortKey {
    pub const ALL: [DocumentSortKey; 6] = [
        DocumentSortKey::Titre,
        DocumentSortKey::Auteur,
        DocumentSortKey::Type,
        DocumentSortKey::Isbn,
        DocumentSortKey::DatePublication,
        DocumentSortKey::Disponible,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DocumentSortKey::Titre => "Titre",
            DocumentSortKey::Auteur => "Auteur",
            DocumentSortKey::Type => "Type",
            DocumentSortKey::Isbn => "ISBN",
            DocumentSortKey::DatePublication => "Publication",
            DocumentSortKey::Disponible => "Statut",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        parse_key(
            value,
            &[
                (DocumentSortKey::Titre, "titre|title"),
                (DocumentSortKey::Auteur, "auteur|author"),
                (DocumentSortKey::Type, "type"),
                (DocumentSortKey::Isbn, "isbn"),
                (DocumentSortKey::DatePublication, "date_publication|date|publication"),
                (DocumentSortKey::Disponible, "disponible|statut|status"),
            ],
        )
    }
}

/// Availability filter of the documents list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvailabilityFilter {
    #[default]
    All,
    Available,
    Borrowed,
}

impl AvailabilityFilter {
    pub fn label(&self) -> &'static str {
        match self {
            AvailabilityFilter::All => "Tous",
            AvailabilityFilter::Available => "Disponibles",
            AvailabilityFilter::Borrowed => "Empruntés",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" | "tous" => Some(AvailabilityFilter::All),
            "disponible" | "available" => Some(AvailabilityFilter::Available),
            "emprunte" | "emprunté" | "borrowed" => Some(AvailabilityFilter::Borrowed),
            _ => None,
        }
    }

    /// Next filter in the cycle All -> Available -> Borrowed -> All
    pub fn next(&self) -> Self {
        match self {
            AvailabilityFilter::All => AvailabilityFilter::Available,
            AvailabilityFilter::Available => AvailabilityFilter::Borrowed,
            AvailabilityFilter::Borrowed => AvailabilityFilter::All,
        }
    }

    /// Value of the `disponible` query parameter
    pub fn as_query(&self) -> Option<bool> {
        match self {
            AvailabilityFilter::All => None,
            AvailabilityFilter::Available => Some(true),
            AvailabilityFilter::Borrowed => Some(false),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            AvailabilityFilter::All => true,
            AvailabilityFilter::Available => document.disponible,
            AvailabilityFilter::Borrowed => !document.disponible,
        }
    }
}

impl Searchable for Document {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.titre.as_str()),
            Cow::Borrowed(self.auteur.as_str()),
            Cow::Borrowed(self.isbn.as_str()),
            Cow::Borrowed(self.doc_type.as_str()),
            Cow::Owned(
                self.date_publication
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            Cow::Owned(display_date(self.date_publication)),
        ]
    }
}

impl Sortable for Document {
    type Key = DocumentSortKey;

    fn sort_value(&self, key: DocumentSortKey) -> SortValue {
        match key {
            DocumentSortKey::Titre => SortValue::text(&self.titre),
            DocumentSortKey::Auteur => SortValue::text(&self.auteur),
            DocumentSortKey::Type => SortValue::text(self.doc_type.as_str()),
            DocumentSortKey::Isbn => SortValue::text(&self.isbn),
            DocumentSortKey::DatePublication => SortValue::date(self.date_publication),
            DocumentSortKey::Disponible => SortValue::Bool(self.disponible),
        }
    }
}

/// Documents list state
#[derive(Debug, Clone)]
pub struct DocumentsView {
    records: Vec<Document>,
    pub query: String,
    pub availability: AvailabilityFilter,
    pub sort: SortState<DocumentSortKey>,
}

impl Default for DocumentsView {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentsView {
    /// Empty list in backend order
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            query: String::new(),
            availability: AvailabilityFilter::All,
            sort: SortState::unsorted(),
        }
    }

    pub fn records(&self) -> &[Document] {
        &self.records
    }

    pub fn set_records(&mut self, records: Vec<Document>) {
        debug!("Documents list replaced ({} records)", records.len());
        self.records = records;
    }

    pub fn find(&self, id: &str) -> Option<&Document> {
        self.records.iter().find(|d| d.id == id)
    }

    /// Rows to display: search, availability filter, then sort
    pub fn visible(&self) -> Vec<&Document> {
        let mut rows: Vec<&Document> = filter_records(&self.records, &self.query)
            .into_iter()
            .filter(|d| self.availability.matches(d))
            .collect();
        sort_records(&mut rows, &self.sort);
        rows
    }

    /// Documents that can be lent, matched by title only
    pub fn available_matching(&self, title_query: &str) -> Vec<&Document> {
        let needle = title_query.to_lowercase();
        self.records
            .iter()
            .filter(|d| d.disponible && d.titre.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn request_sort(&mut self, key: DocumentSortKey) {
        self.sort.request(key);
    }

    pub fn apply_deleted(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|d| d.id != id);
        before != self.records.len()
    }

    pub async fn reload(&mut self, api: &dyn LibraryApi) -> Result<usize, ApiError> {
        self.reload_matching(api, &DocumentQuery::default()).await
    }

    /// Replace the list with the documents the backend selects for `query`
    pub async fn reload_matching(
        &mut self,
        api: &dyn LibraryApi,
        query: &DocumentQuery,
    ) -> Result<usize, ApiError> {
        let records = api.list_documents(query).await?;
        let count = records.len();
        self.set_records(records);
        Ok(count)
    }

    /// Create (`id` = None) or update a document, then reload the list.
    /// Returns the id of the saved document.
    pub async fn save(
        &mut self,
        api: &dyn LibraryApi,
        id: Option<&str>,
        payload: &DocumentPayload,
    ) -> Result<String, ApiError> {
        let saved_id = match id {
            Some(id) => {
                api.update_document(id, payload).await?;
                info!("Updated document {}", id);
                id.to_string()
            }
            None => {
                let id = api.create_document(payload).await?;
                info!("Created document {} ({})", id, payload.titre);
                id
            }
        };
        self.reload(api).await?;
        Ok(saved_id)
    }

    /// Delete a confirmed document and drop it from the local list
    pub async fn delete(&mut self, api: &dyn LibraryApi, id: &str) -> Result<(), ApiError> {
        api.delete_document(id).await?;
        info!("Deleted document {}", id);
        self.apply_deleted(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockLibraryApi;
    use crate::listing::SortDirection;
    use crate::models::DocumentType;
    use chrono::NaiveDate;

    fn document(id: &str, titre: &str, doc_type: DocumentType, disponible: bool) -> Document {
        Document {
            id: id.to_string(),
            titre: titre.to_string(),
            auteur: "Auteur".to_string(),
            doc_type,
            isbn: String::new(),
            date_publication: NaiveDate::from_ymd_opt(2001, 1, 1),
            disponible,
            emprunts: Vec::new(),
        }
    }

    fn view() -> DocumentsView {
        let mut view = DocumentsView::new();
        view.set_records(vec![
            document("d1", "Le Petit Prince", DocumentType::Book, true),
            document("d2", "Heat", DocumentType::Dvd, false),
            document("d3", "Abbey Road", DocumentType::Cd, true),
        ]);
        view
    }

    fn ids(rows: &[&Document]) -> Vec<String> {
        rows.iter().map(|d| d.id.clone()).collect()
    }

    #[test]
    fn test_visible_combines_search_filter_and_sort() {
        let mut view = view();
        assert_eq!(ids(&view.visible()), vec!["d1", "d2", "d3"]);

        view.availability = AvailabilityFilter::Available;
        view.request_sort(DocumentSortKey::Titre);
        assert_eq!(ids(&view.visible()), vec!["d3", "d1"]);

        view.query = "PETIT".to_string();
        assert_eq!(ids(&view.visible()), vec!["d1"]);

        view.query = "dvd".to_string();
        view.availability = AvailabilityFilter::Borrowed;
        assert_eq!(ids(&view.visible()), vec!["d2"]);
    }

    #[test]
    fn test_search_matches_publication_date() {
        let mut view = view();
        view.query = "2001-01".to_string();
        assert_eq!(view.visible().len(), 3);
        view.query = "01/01/2001".to_string();
        assert_eq!(view.visible().len(), 3);
    }

    #[test]
    fn test_sort_key_names() {
        assert_eq!(DocumentSortKey::parse("Title"), Some(DocumentSortKey::Titre));
        assert_eq!(DocumentSortKey::parse("date-publication"), Some(DocumentSortKey::DatePublication));
        assert_eq!(DocumentSortKey::parse("pages"), None);
        assert_eq!(AvailabilityFilter::parse("emprunte"), Some(AvailabilityFilter::Borrowed));
        assert_eq!(AvailabilityFilter::All.next().next().next(), AvailabilityFilter::All);
    }

    #[test]
    fn test_available_matching_skips_borrowed() {
        let view = view();
        assert_eq!(ids(&view.available_matching("")), vec!["d1", "d3"]);
        assert!(view.available_matching("heat").is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_then_reloads() {
        let mut api = MockLibraryApi::new();
        api.expect_create_document()
            .withf(|payload| payload.titre == "Heat")
            .times(1)
            .returning(|_| Ok("d9".to_string()));
        api.expect_list_documents()
            .times(1)
            .returning(|_| Ok(vec![document("d9", "Heat", DocumentType::Dvd, true)]));

        let payload = DocumentPayload {
            titre: "Heat".to_string(),
            auteur: "Michael Mann".to_string(),
            doc_type: DocumentType::Dvd,
            isbn: String::new(),
            date_publication: "1995-12-15".to_string(),
            disponible: true,
        };
        let mut view = DocumentsView::new();
        let id = view.save(&api, None, &payload).await.unwrap();
        assert_eq!(id, "d9");
        assert_eq!(view.records().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_records() {
        let mut api = MockLibraryApi::new();
        api.expect_delete_document().times(1).returning(|_| {
            Err(ApiError::Status {
                status_code: 400,
                message: "Document emprunté".to_string(),
            })
        });

        let mut view = view();
        view.request_sort(DocumentSortKey::Titre);
        assert!(view.delete(&api, "d2").await.is_err());
        assert_eq!(view.records().len(), 3);
        assert_eq!(view.sort, SortState::by(DocumentSortKey::Titre, SortDirection::Asc));
    }

    #[tokio::test]
    async fn test_delete_removes_locally() {
        let mut api = MockLibraryApi::new();
        api.expect_delete_document()
            .withf(|id| id == "d2")
            .times(1)
            .returning(|_| Ok(()));

        let mut view = view();
        view.delete(&api, "d2").await.unwrap();
        assert!(view.find("d2").is_none());
        assert_eq!(view.records().len(), 2);
    }

    #[tokio::test]
    async fn test_reload_matching_sends_backend_filter() {
        let mut api = MockLibraryApi::new();
        api.expect_list_documents()
            .withf(|query| {
                query.doc_type == Some(DocumentType::Dvd)
                    && query.disponible == AvailabilityFilter::Borrowed.as_query()
            })
            .times(1)
            .returning(|_| Ok(vec![document("d2", "Heat", DocumentType::Dvd, false)]));

        let mut view = view();
        let query = DocumentQuery {
            doc_type: Some(DocumentType::Dvd),
            disponible: Some(false),
        };
        assert_eq!(view.reload_matching(&api, &query).await.unwrap(), 1);
        assert_eq!(ids(&view.visible()), vec!["d2"]);
        assert_eq!(AvailabilityFilter::All.as_query(), None);
        assert_eq!(AvailabilityFilter::Available.as_query(), Some(true));
    }
}
