use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use clap::Parser;
use mediatheque::api::{ApiError, LibraryApi};
use mediatheque::cli::Cli;
use mediatheque::commands;
use mediatheque::config::Config;
use mediatheque::export::{self, ExportFormat};
use mediatheque::forms::{AbonneForm, DocumentForm};
use mediatheque::listing::SortDirection;
use mediatheque::models::{
    Abonne, AbonnePayload, Document, DocumentPayload, DocumentQuery, DocumentSummary,
    DocumentType, Emprunt, EmpruntPayload, LoanStatus, Stats,
};
use mediatheque::views::{DocumentSortKey, DocumentsView, EmpruntsView};

/// In-memory backend with the same observable behavior as the REST API
#[derive(Default)]
struct FakeLibrary {
    documents: Mutex<Vec<Document>>,
    abonnes: Mutex<Vec<Abonne>>,
    emprunts: Mutex<Vec<Emprunt>>,
    next_id: Mutex<u32>,
    document_queries: Mutex<Vec<DocumentQuery>>,
}

impl FakeLibrary {
    fn with_documents(documents: Vec<Document>) -> Self {
        let library = FakeLibrary::default();
        *library.documents.lock().unwrap() = documents;
        library
    }

    /// Ids look like `new-d1`, never like the seeded `d1`
    fn new_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("new-{}{}", prefix, next)
    }

    fn not_found(what: &str, id: &str) -> ApiError {
        ApiError::Status {
            status_code: 404,
            message: format!("{} {} introuvable", what, id),
        }
    }
}

fn document_from(id: String, payload: &DocumentPayload) -> Document {
    Document {
        id,
        titre: payload.titre.clone(),
        auteur: payload.auteur.clone(),
        doc_type: payload.doc_type.clone(),
        isbn: payload.isbn.clone(),
        date_publication: NaiveDate::parse_from_str(&payload.date_publication, "%Y-%m-%d").ok(),
        disponible: payload.disponible,
        emprunts: Vec::new(),
    }
}

#[async_trait]
impl LibraryApi for FakeLibrary {
    async fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<Document>, ApiError> {
        self.document_queries.lock().unwrap().push(query.clone());
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| query.doc_type.as_ref().map_or(true, |t| &d.doc_type == t))
            .filter(|d| query.disponible.map_or(true, |dispo| d.disponible == dispo))
            .cloned()
            .collect())
    }

    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("Document", id))
    }

    async fn create_document(&self, payload: &DocumentPayload) -> Result<String, ApiError> {
        let id = self.new_id("d");
        self.documents
            .lock()
            .unwrap()
            .push(document_from(id.clone(), payload));
        Ok(id)
    }

    async fn update_document(&self, id: &str, payload: &DocumentPayload) -> Result<(), ApiError> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Self::not_found("Document", id))?;
        *document = document_from(id.to_string(), payload);
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<(), ApiError> {
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|d| d.id != id);
        if documents.len() == before {
            return Err(Self::not_found("Document", id));
        }
        Ok(())
    }

    async fn list_abonnes(&self) -> Result<Vec<Abonne>, ApiError> {
        Ok(self.abonnes.lock().unwrap().clone())
    }

    async fn get_abonne(&self, id: &str) -> Result<Abonne, ApiError> {
        self.abonnes
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("Abonné", id))
    }

    async fn create_abonne(&self, payload: &AbonnePayload) -> Result<String, ApiError> {
        let id = self.new_id("a");
        self.abonnes.lock().unwrap().push(Abonne {
            id: id.clone(),
            nom: payload.nom.clone(),
            prenom: payload.prenom.clone(),
            email: payload.email.clone(),
            telephone: payload.telephone.clone(),
            adresse: payload.adresse.clone(),
            date_inscription: Some(Utc::now()),
            emprunts_actuels: Vec::new(),
            historique_emprunts: Vec::new(),
        });
        Ok(id)
    }

    async fn update_abonne(&self, id: &str, _payload: &AbonnePayload) -> Result<(), ApiError> {
        Err(Self::not_found("Abonné", id))
    }

    async fn delete_abonne(&self, id: &str) -> Result<(), ApiError> {
        Err(Self::not_found("Abonné", id))
    }

    async fn list_abonne_emprunts(&self, abonne_id: &str) -> Result<Vec<Emprunt>, ApiError> {
        Ok(self
            .emprunts
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.abonne_id == abonne_id)
            .cloned()
            .collect())
    }

    async fn list_emprunts(&self) -> Result<Vec<Emprunt>, ApiError> {
        Ok(self.emprunts.lock().unwrap().clone())
    }

    async fn list_overdue_emprunts(&self) -> Result<Vec<Emprunt>, ApiError> {
        let now = Utc::now();
        Ok(self
            .emprunts
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.date_retour_effective.is_none())
            .filter(|e| e.date_retour_prevue.map_or(false, |d| d < now))
            .cloned()
            .collect())
    }

    async fn create_emprunt(&self, payload: &EmpruntPayload) -> Result<String, ApiError> {
        let titre = {
            let mut documents = self.documents.lock().unwrap();
            let document = documents
                .iter_mut()
                .find(|d| d.id == payload.document_id)
                .ok_or_else(|| Self::not_found("Document", &payload.document_id))?;
            if !document.disponible {
                return Err(ApiError::Status {
                    status_code: 400,
                    message: "Document non disponible".to_string(),
                });
            }
            document.disponible = false;
            document.titre.clone()
        };

        let id = self.new_id("e");
        let now = Utc::now();
        self.emprunts.lock().unwrap().push(Emprunt {
            id: id.clone(),
            abonne_id: payload.abonne_id.clone(),
            document_id: payload.document_id.clone(),
            date_emprunt: Some(now),
            date_retour_prevue: Some(now + Duration::days(21)),
            date_retour_effective: None,
            statut: LoanStatus::EnCours,
            document: Some(DocumentSummary {
                titre,
                auteur: String::new(),
            }),
            abonne: None,
        });
        Ok(id)
    }

    async fn return_emprunt(&self, id: &str) -> Result<(), ApiError> {
        let mut emprunts = self.emprunts.lock().unwrap();
        let emprunt = emprunts
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Self::not_found("Emprunt", id))?;
        emprunt.date_retour_effective = Some(Utc::now());
        emprunt.statut = LoanStatus::Retourne;
        Ok(())
    }

    async fn delete_emprunt(&self, id: &str) -> Result<(), ApiError> {
        self.emprunts.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn stats(&self) -> Result<Stats, ApiError> {
        let documents = self.documents.lock().unwrap();
        let emprunts = self.emprunts.lock().unwrap();
        Ok(Stats {
            total_documents: documents.len() as u64,
            total_abonnes: self.abonnes.lock().unwrap().len() as u64,
            emprunts_en_cours: emprunts.iter().filter(|e| !e.is_returned()).count() as u64,
            emprunts_en_retard: 0,
            total_documents_dispo: Some(documents.iter().filter(|d| d.disponible).count() as u64),
            total_documents_empruntes: Some(
                documents.iter().filter(|d| !d.disponible).count() as u64,
            ),
        })
    }
}

fn document(id: &str, titre: &str, auteur: &str, doc_type: DocumentType) -> Document {
    Document {
        id: id.to_string(),
        titre: titre.to_string(),
        auteur: auteur.to_string(),
        doc_type,
        isbn: String::new(),
        date_publication: NaiveDate::from_ymd_opt(1990, 1, 1),
        disponible: true,
        emprunts: Vec::new(),
    }
}

fn catalogue() -> FakeLibrary {
    FakeLibrary::with_documents(vec![
        document("d1", "Vol de nuit", "Saint-Exupéry", DocumentType::Book),
        document("d2", "Amélie", "Jeunet", DocumentType::Dvd),
        document("d3", "Kind of Blue", "Davis", DocumentType::Cd),
    ])
}

#[tokio::test]
async fn document_form_create_then_delete() {
    let api = catalogue();
    let mut view = DocumentsView::new();
    view.reload(&api).await.expect("initial load");

    // A book needs an ISBN; a DVD does not
    let mut form = DocumentForm {
        titre: "Citadelle".to_string(),
        auteur: "Saint-Exupéry".to_string(),
        doc_type: "livre".to_string(),
        date_publication: "1948-01-01".to_string(),
        ..DocumentForm::default()
    };
    assert!(form.validate().is_err());
    form.isbn = "978-2070".to_string();
    let payload = form.validate().expect("valid form");

    let id = view.save(&api, None, &payload).await.expect("create");
    assert!(!["d1", "d2", "d3"].contains(&id.as_str()));
    assert_eq!(view.records().len(), 4);
    assert_eq!(view.find(&id).map(|d| d.titre.as_str()), Some("Citadelle"));

    view.delete(&api, &id).await.expect("delete");
    assert!(view.find(&id).is_none());

    // Deleting again fails and leaves the list alone
    let err = view.delete(&api, &id).await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(view.records().len(), 3);
}

#[tokio::test]
async fn search_and_sort_visible_rows() {
    let api = catalogue();
    let mut view = DocumentsView::new();
    view.reload(&api).await.expect("load");

    view.request_sort(DocumentSortKey::Titre);
    let titles: Vec<&str> = view.visible().iter().map(|d| d.titre.as_str()).collect();
    assert_eq!(titles, vec!["Amélie", "Kind of Blue", "Vol de nuit"]);

    view.request_sort(DocumentSortKey::Titre);
    assert_eq!(view.sort.direction, SortDirection::Desc);

    view.query = "DVD".to_string();
    let titles: Vec<&str> = view.visible().iter().map(|d| d.titre.as_str()).collect();
    assert_eq!(titles, vec!["Amélie"]);
}

#[tokio::test]
async fn loan_lifecycle_updates_status_and_availability() {
    let api = catalogue();
    let abonne_id = api
        .create_abonne(
            &AbonneForm {
                nom: "Dupont".to_string(),
                prenom: "Jean".to_string(),
                email: "jean@dupont.fr".to_string(),
                ..AbonneForm::default()
            }
            .validate()
            .expect("valid subscriber"),
        )
        .await
        .expect("create subscriber");

    let mut loans = EmpruntsView::new();
    let payload = EmpruntPayload {
        abonne_id: abonne_id.clone(),
        document_id: "d1".to_string(),
    };
    let loan_id = loans.create(&api, &payload).await.expect("create loan");
    assert_eq!(loans.count(LoanStatus::EnCours), 1);
    assert!(!api.get_document("d1").await.expect("document").disponible);

    // The same document cannot be lent twice
    assert!(loans.create(&api, &payload).await.is_err());
    assert_eq!(loans.records().len(), 1);

    // Three weeks later the loan shows as overdue without any backend call
    let later = Utc::now() + Duration::days(22);
    assert_eq!(loans.refresh_statuses(later), 1);
    assert_eq!(loans.count(LoanStatus::EnRetard), 1);

    loans.register_return(&api, &loan_id).await.expect("return");
    let returned = loans.find(&loan_id).expect("loan kept");
    assert_eq!(returned.statut, LoanStatus::Retourne);
    assert!(returned.date_retour_effective.is_some());

    // A returned loan stays returned whatever the date
    assert_eq!(loans.refresh_statuses(later), 0);

    let mut history = EmpruntsView::new();
    assert_eq!(
        history.reload_for_abonne(&api, &abonne_id).await.expect("history"),
        1
    );
}

#[test]
fn export_writes_pdf_and_csv_named_after_title() {
    let dir = tempfile::tempdir().expect("tempdir");
    let date = NaiveDate::from_ymd_opt(2024, 10, 18).unwrap();
    let documents = vec![
        document("d1", "Vol de nuit", "Saint-Exupéry", DocumentType::Book),
        document("d2", "Amélie", "Jeunet", DocumentType::Dvd),
    ];
    let table = export::documents_table(&documents);

    let pdf = export::export_table(&table, ExportFormat::Pdf, dir.path(), date).expect("pdf");
    assert_eq!(
        pdf.file_name().and_then(|n| n.to_str()),
        Some("liste_des_documents_2024-10-18.pdf")
    );
    let loaded = lopdf::Document::load(&pdf).expect("readable pdf");
    assert_eq!(loaded.get_pages().len(), 1);

    let csv = export::export_table(&table, ExportFormat::Csv, dir.path(), date).expect("csv");
    let content = std::fs::read_to_string(&csv).expect("csv content");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Titre,Auteur,Type,ISBN,Statut"));
    assert!(lines[1].starts_with("Vol de nuit,Saint-Exupéry,livre"));
}

#[tokio::test]
async fn cli_export_command_uses_output_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().to_str().expect("utf-8 path").to_string();
    let cli = Cli::try_parse_from([
        "mediatheque",
        "documents",
        "export",
        "--format",
        "csv",
        "--output",
        output.as_str(),
        "--search",
        "blue",
    ])
    .expect("valid arguments");

    let api = catalogue();
    commands::run(&cli.command, &api, &Config::default())
        .await
        .expect("export command");

    let exported: Vec<_> = std::fs::read_dir(dir.path())
        .expect("output dir")
        .filter_map(|entry| entry.ok())
        .collect();
    assert_eq!(exported.len(), 1);
    let content = std::fs::read_to_string(exported[0].path()).expect("csv");
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains("Kind of Blue"));
}

#[tokio::test]
async fn cli_document_list_sends_type_and_availability_to_backend() {
    let api = catalogue();
    let cli = Cli::try_parse_from([
        "mediatheque",
        "documents",
        "list",
        "--type",
        "dvd",
        "--status",
        "disponible",
    ])
    .expect("valid arguments");
    commands::run(&cli.command, &api, &Config::default())
        .await
        .expect("list command");

    let queries = api.document_queries.lock().unwrap();
    assert_eq!(
        queries.as_slice(),
        &[DocumentQuery {
            doc_type: Some(DocumentType::Dvd),
            disponible: Some(true),
        }]
    );
}

#[tokio::test]
async fn cli_show_of_unknown_document_says_not_found() {
    let api = catalogue();
    let cli = Cli::try_parse_from(["mediatheque", "documents", "show", "d42"]).expect("valid arguments");
    let err = commands::run(&cli.command, &api, &Config::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Document d42 not found");
}

#[tokio::test]
async fn cli_loan_of_unavailable_document_is_refused() {
    let api = catalogue();
    api.create_emprunt(&EmpruntPayload {
        abonne_id: "a1".to_string(),
        document_id: "d2".to_string(),
    })
    .await
    .expect("first loan");

    let cli = Cli::try_parse_from([
        "mediatheque",
        "emprunts",
        "add",
        "--abonne",
        "a1",
        "--document",
        "d2",
    ])
    .expect("valid arguments");
    let err = commands::run(&cli.command, &api, &Config::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not available"));
}

#[test]
fn config_from_variables() {
    let config = Config::from_source(|name| match name {
        "MEDIATHEQUE_API_URL" => Some("http://biblio.local:8080/api/".to_string()),
        "MEDIATHEQUE_STATUS_REFRESH_SECONDS" => Some("30".to_string()),
        _ => None,
    })
    .expect("config");
    assert_eq!(config.api.base_url, "http://biblio.local:8080/api");
    assert_eq!(config.status_refresh_interval(), std::time::Duration::from_secs(30));
    assert!(Config::from_source(|name| {
        (name == "MEDIATHEQUE_STATUS_REFRESH_SECONDS").then(|| "soon".to_string())
    })
    .is_err());
}

#[test]
fn overdue_derivation_is_a_pure_function_of_dates() {
    let now = Utc.with_ymd_and_hms(2024, 10, 18, 12, 0, 0).unwrap();
    let past = Some(now - Duration::days(1));
    let future = Some(now + Duration::days(1));

    let status = |prevue, effective| mediatheque::loan_status::derive_status(prevue, effective, now).0;
    assert_eq!(status(past, None), LoanStatus::EnRetard);
    assert_eq!(status(future, None), LoanStatus::EnCours);
    assert_eq!(status(None, None), LoanStatus::EnCours);
    assert_eq!(status(past, Some(now)), LoanStatus::Retourne);
}
