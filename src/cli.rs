use clap::{Args, Parser, Subcommand};

use crate::export::ExportFormat;
use crate::listing::{SortDirection, SortState};
use crate::models::DocumentType;
use crate::views::{AbonneSortKey, AvailabilityFilter, DocumentSortKey, EmpruntSortKey, StatusFilter};

#[derive(Parser)]
#[command(name = "mediatheque")]
#[command(about = "Terminal administration client for a media library: documents, subscribers and loans")]
#[command(version)]
pub struct Cli {
    /// Backend API base URL (overrides MEDIATHEQUE_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show dashboard counters
    Stats,

    /// Manage documents
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },

    /// Manage subscribers
    Abonnes {
        #[command(subcommand)]
        action: AbonnesAction,
    },

    /// Manage loans
    Emprunts {
        #[command(subcommand)]
        action: EmpruntsAction,
    },

    /// Launch the terminal UI
    Tui,
}

/// Options shared by the list commands
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Free-text search (case-insensitive substring)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Column to sort by
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort in descending order
    #[arg(long)]
    pub desc: bool,
}

/// Options of the export commands
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output format (pdf, csv)
    #[arg(short, long, default_value = "pdf")]
    pub format: String,

    /// Output directory (defaults to MEDIATHEQUE_EXPORT_DIR)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Free-text search applied before exporting
    #[arg(short, long)]
    pub search: Option<String>,
}

/// Document fields for add/update
#[derive(Args, Debug, Clone, Default)]
pub struct DocumentFields {
    /// Title
    #[arg(long)]
    pub titre: Option<String>,

    /// Author
    #[arg(long)]
    pub auteur: Option<String>,

    /// Type (livre, dvd, magazine, cd)
    #[arg(long = "type")]
    pub doc_type: Option<String>,

    /// ISBN, required for books
    #[arg(long)]
    pub isbn: Option<String>,

    /// Publication date (YYYY-MM-DD)
    #[arg(long)]
    pub date_publication: Option<String>,

    /// Availability (true/false)
    #[arg(long)]
    pub disponible: Option<bool>,
}

/// Subscriber fields for add/update
#[derive(Args, Debug, Clone, Default)]
pub struct AbonneFields {
    /// Last name
    #[arg(long)]
    pub nom: Option<String>,

    /// First name
    #[arg(long)]
    pub prenom: Option<String>,

    /// Email address
    #[arg(long)]
    pub email: Option<String>,

    /// Phone number
    #[arg(long)]
    pub telephone: Option<String>,

    /// Postal address
    #[arg(long)]
    pub adresse: Option<String>,
}

#[derive(Subcommand)]
pub enum DocumentsAction {
    /// List documents
    List {
        #[command(flatten)]
        list: ListArgs,

        /// Availability filter (all, disponible, emprunte)
        #[arg(long, default_value = "all")]
        status: String,

        /// Type filter applied by the backend (livre, dvd, magazine, cd)
        #[arg(long = "type")]
        doc_type: Option<String>,
    },

    /// Show one document
    Show {
        /// Document id
        id: String,
    },

    /// Create a document
    Add {
        #[command(flatten)]
        fields: DocumentFields,
    },

    /// Update a document; omitted fields keep their current value
    Update {
        /// Document id
        id: String,

        #[command(flatten)]
        fields: DocumentFields,
    },

    /// Delete a document
    Delete {
        /// Document id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export the documents list
    Export {
        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Subcommand)]
pub enum AbonnesAction {
    /// List subscribers
    List {
        #[command(flatten)]
        list: ListArgs,
    },

    /// Show one subscriber
    Show {
        /// Subscriber id
        id: String,
    },

    /// Create a subscriber
    Add {
        #[command(flatten)]
        fields: AbonneFields,
    },

    /// Update a subscriber; omitted fields keep their current value
    Update {
        /// Subscriber id
        id: String,

        #[command(flatten)]
        fields: AbonneFields,
    },

    /// Delete a subscriber
    Delete {
        /// Subscriber id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List the loans of a subscriber
    Loans {
        /// Subscriber id
        id: String,
    },

    /// Export the subscribers list
    Export {
        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Subcommand)]
pub enum EmpruntsAction {
    /// List loans (most recent first unless --sort is given)
    List {
        #[command(flatten)]
        list: ListArgs,

        /// Status filter (tous, en_cours, en_retard, retourne)
        #[arg(long, default_value = "tous")]
        status: String,
    },

    /// Register a loan
    Add {
        /// Subscriber id
        #[arg(long)]
        abonne: String,

        /// Document id
        #[arg(long)]
        document: String,
    },

    /// Register the return of a loan
    Return {
        /// Loan id
        id: String,
    },

    /// Delete a loan
    Delete {
        /// Loan id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List overdue loans as reported by the backend
    Overdue,

    /// Export the loans list
    Export {
        #[command(flatten)]
        export: ExportArgs,

        /// Status filter (tous, en_cours, en_retard, retourne)
        #[arg(long, default_value = "tous")]
        status: String,
    },
}

impl Commands {
    pub fn parse_availability(value: &str) -> Result<AvailabilityFilter, anyhow::Error> {
        AvailabilityFilter::parse(value).ok_or_else(|| {
            anyhow::anyhow!("Unsupported availability filter: {}. Supported: all, disponible, emprunte", value)
        })
    }

    pub fn parse_document_type(value: &str) -> Result<DocumentType, anyhow::Error> {
        match DocumentType::parse(value) {
            DocumentType::Other(other) => Err(anyhow::anyhow!(
                "Unsupported document type: {}. Supported: livre, dvd, magazine, cd",
                other
            )),
            doc_type => Ok(doc_type),
        }
    }

    pub fn parse_status(value: &str) -> Result<StatusFilter, anyhow::Error> {
        StatusFilter::parse(value).ok_or_else(|| {
            anyhow::anyhow!(
                "Unsupported status filter: {}. Supported: tous, en_cours, en_retard, retourne",
                value
            )
        })
    }

    pub fn parse_export_format(value: &str) -> Result<ExportFormat, anyhow::Error> {
        ExportFormat::parse(value)
    }

    pub fn document_sort(list: &ListArgs) -> Result<Option<SortState<DocumentSortKey>>, anyhow::Error> {
        sort_state(list, DocumentSortKey::parse, "titre, auteur, type, isbn, date_publication, disponible")
    }

    pub fn abonne_sort(list: &ListArgs) -> Result<Option<SortState<AbonneSortKey>>, anyhow::Error> {
        sort_state(list, AbonneSortKey::parse, "nom, prenom, email, telephone, date_inscription, emprunts")
    }

    pub fn emprunt_sort(list: &ListArgs) -> Result<Option<SortState<EmpruntSortKey>>, anyhow::Error> {
        sort_state(
            list,
            EmpruntSortKey::parse,
            "document, abonne, date_emprunt, date_retour_prevue, date_retour_effective, statut",
        )
    }
}

fn sort_state<K: Copy + PartialEq>(
    list: &ListArgs,
    parse: fn(&str) -> Option<K>,
    supported: &str,
) -> Result<Option<SortState<K>>, anyhow::Error> {
    let Some(name) = &list.sort else {
        return Ok(None);
    };
    let key = parse(name)
        .ok_or_else(|| anyhow::anyhow!("Unsupported sort column: {}. Supported: {}", name, supported))?;
    let direction = if list.desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    Ok(Some(SortState::by(key, direction)))
}
