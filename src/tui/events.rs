//! Results of background backend calls, delivered to the UI task

use crate::models::{Abonne, Document, Emprunt, Stats};

/// Which collection a create/update/delete touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Document,
    Abonne,
    Emprunt,
}

impl Entity {
    pub fn label(&self) -> &'static str {
        match self {
            Entity::Document => "Document",
            Entity::Abonne => "Subscriber",
            Entity::Emprunt => "Loan",
        }
    }
}

/// Application events produced by spawned request tasks.
///
/// Errors are carried as display strings; they end up in the status bar.
#[derive(Debug, Clone)]
pub enum AppEvent {
    StatsLoaded(Result<Stats, String>),
    DocumentsLoaded(Result<Vec<Document>, String>),
    AbonnesLoaded(Result<Vec<Abonne>, String>),
    EmpruntsLoaded(Result<Vec<Emprunt>, String>),
    AbonneLoansLoaded {
        abonne_id: String,
        result: Result<Vec<Emprunt>, String>,
    },
    /// Create or update finished; `Ok` carries the record id
    Saved {
        entity: Entity,
        created: bool,
        result: Result<String, String>,
    },
    Deleted {
        entity: Entity,
        id: String,
        result: Result<(), String>,
    },
    Returned {
        id: String,
        result: Result<(), String>,
    },
}
