//! Input collection and client-side validation for create/update operations
//!
//! Forms never talk to the network. A valid form hands its payload to a
//! caller-supplied handler, which performs the request.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{
    Abonne, AbonnePayload, Document, DocumentPayload, DocumentType, EmpruntPayload,
};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid"));

/// A validation failure attached to one field (wire name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All validation failures of a submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("invalid form: {}", summarize(.errors))]
pub struct FormErrors {
    errors: Vec<FieldError>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    /// Message for a field, if it failed
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    fn into_result<T>(self, payload: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(payload)
        } else {
            Err(self)
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Document create/edit form
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentForm {
    pub titre: String,
    pub auteur: String,
    /// Raw type input; empty until the user picks one
    pub doc_type: String,
    pub isbn: String,
    /// YYYY-MM-DD
    pub date_publication: String,
    pub disponible: bool,
}

impl Default for DocumentForm {
    fn default() -> Self {
        Self {
            titre: String::new(),
            auteur: String::new(),
            doc_type: String::new(),
            isbn: String::new(),
            date_publication: String::new(),
            disponible: true,
        }
    }
}

impl DocumentForm {
    /// Pre-fill from an existing record
    pub fn from_document(document: &Document) -> Self {
        Self {
            titre: document.titre.clone(),
            auteur: document.auteur.clone(),
            doc_type: document.doc_type.as_str().to_string(),
            isbn: document.isbn.clone(),
            date_publication: document
                .date_publication
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            disponible: document.disponible,
        }
    }

    pub fn validate(&self) -> Result<DocumentPayload, FormErrors> {
        let mut errors = FormErrors::default();

        if is_blank(&self.titre) {
            errors.add("titre", "Title is required");
        }
        if is_blank(&self.auteur) {
            errors.add("auteur", "Author is required");
        }

        let doc_type = DocumentType::parse(&self.doc_type);
        if is_blank(&self.doc_type) {
            errors.add("type", "Type is required");
        } else if let DocumentType::Other(value) = &doc_type {
            errors.add("type", &format!("Unknown type '{}' (livre, dvd, magazine, cd)", value));
        }

        if doc_type.requires_isbn() && is_blank(&self.isbn) {
            errors.add("isbn", "ISBN is required for books");
        }

        let date_publication = self.date_publication.trim();
        if date_publication.is_empty() {
            errors.add("date_publication", "Publication date is required");
        } else if NaiveDate::parse_from_str(date_publication, "%Y-%m-%d").is_err() {
            errors.add("date_publication", "Invalid date format (YYYY-MM-DD)");
        }

        errors.into_result(DocumentPayload {
            titre: self.titre.trim().to_string(),
            auteur: self.auteur.trim().to_string(),
            doc_type,
            isbn: self.isbn.trim().to_string(),
            date_publication: date_publication.to_string(),
            disponible: self.disponible,
        })
    }

    /// Validate, then hand the payload to `handler`
    pub fn submit<R>(&self, handler: impl FnOnce(DocumentPayload) -> R) -> Result<R, FormErrors> {
        self.validate().map(handler)
    }
}

/// Member create/edit form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbonneForm {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: String,
    pub adresse: String,
}

impl AbonneForm {
    pub fn from_abonne(abonne: &Abonne) -> Self {
        Self {
            nom: abonne.nom.clone(),
            prenom: abonne.prenom.clone(),
            email: abonne.email.clone(),
            telephone: abonne.telephone.clone(),
            adresse: abonne.adresse.clone(),
        }
    }

    pub fn validate(&self) -> Result<AbonnePayload, FormErrors> {
        let mut errors = FormErrors::default();

        if is_blank(&self.nom) {
            errors.add("nom", "Last name is required");
        }
        if is_blank(&self.prenom) {
            errors.add("prenom", "First name is required");
        }
        if is_blank(&self.email) {
            errors.add("email", "Email is required");
        } else if !is_valid_email(&self.email) {
            errors.add("email", "Email is not valid");
        }

        errors.into_result(AbonnePayload {
            nom: self.nom.trim().to_string(),
            prenom: self.prenom.trim().to_string(),
            email: self.email.trim().to_string(),
            telephone: self.telephone.trim().to_string(),
            adresse: self.adresse.trim().to_string(),
        })
    }

    pub fn submit<R>(&self, handler: impl FnOnce(AbonnePayload) -> R) -> Result<R, FormErrors> {
        self.validate().map(handler)
    }
}

/// New loan form: one member and one available document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmpruntForm {
    pub abonne_id: Option<String>,
    pub document_id: Option<String>,
}

impl EmpruntForm {
    pub fn validate(&self) -> Result<EmpruntPayload, FormErrors> {
        let mut errors = FormErrors::default();

        let abonne_id = self.abonne_id.clone().filter(|id| !is_blank(id));
        let document_id = self.document_id.clone().filter(|id| !is_blank(id));

        if abonne_id.is_none() {
            errors.add("abonne_id", "Select a member");
        }
        if document_id.is_none() {
            errors.add("document_id", "Select a document");
        }

        errors.into_result(EmpruntPayload {
            abonne_id: abonne_id.unwrap_or_default(),
            document_id: document_id.unwrap_or_default(),
        })
    }

    pub fn submit<R>(&self, handler: impl FnOnce(EmpruntPayload) -> R) -> Result<R, FormErrors> {
        self.validate().map(handler)
    }
}
