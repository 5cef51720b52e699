//! REST backend access
//!
//! [`LibraryApi`] is the seam between the screens and the network: the
//! terminal UI and the command line hold an `Arc<dyn LibraryApi>` and the
//! production implementation is [`ApiClient`].

pub mod client;
pub mod errors;

use async_trait::async_trait;

pub use client::ApiClient;
pub use errors::ApiError;

use crate::models::{
    Abonne, AbonnePayload, Document, DocumentPayload, DocumentQuery, Emprunt, EmpruntPayload,
    Stats,
};

/// Operations offered by the media library backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LibraryApi: Send + Sync {
    // Documents
    async fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<Document>, ApiError>;
    async fn get_document(&self, id: &str) -> Result<Document, ApiError>;
    /// Returns the id of the created document
    async fn create_document(&self, payload: &DocumentPayload) -> Result<String, ApiError>;
    async fn update_document(&self, id: &str, payload: &DocumentPayload) -> Result<(), ApiError>;
    async fn delete_document(&self, id: &str) -> Result<(), ApiError>;

    // Members
    async fn list_abonnes(&self) -> Result<Vec<Abonne>, ApiError>;
    async fn get_abonne(&self, id: &str) -> Result<Abonne, ApiError>;
    async fn create_abonne(&self, payload: &AbonnePayload) -> Result<String, ApiError>;
    async fn update_abonne(&self, id: &str, payload: &AbonnePayload) -> Result<(), ApiError>;
    async fn delete_abonne(&self, id: &str) -> Result<(), ApiError>;
    /// Loan history of one member
    async fn list_abonne_emprunts(&self, abonne_id: &str) -> Result<Vec<Emprunt>, ApiError>;

    // Loans
    async fn list_emprunts(&self) -> Result<Vec<Emprunt>, ApiError>;
    async fn list_overdue_emprunts(&self) -> Result<Vec<Emprunt>, ApiError>;
    async fn create_emprunt(&self, payload: &EmpruntPayload) -> Result<String, ApiError>;
    async fn return_emprunt(&self, id: &str) -> Result<(), ApiError>;
    async fn delete_emprunt(&self, id: &str) -> Result<(), ApiError>;

    // Dashboard
    async fn stats(&self) -> Result<Stats, ApiError>;
}
