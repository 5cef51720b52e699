use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use dates::parse_datetime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub titre: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub auteur: String,
    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,
    #[serde(default, deserialize_with = "lenient::string")]
    pub isbn: String,
    #[serde(default, deserialize_with = "dates::naive_date_opt")]
    pub date_publication: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub disponible: bool,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub emprunts: Vec<String>,
}

impl Document {
    pub fn availability_label(&self) -> &'static str {
        if self.disponible {
            "Disponible"
        } else {
            "Emprunté"
        }
    }
}

/// Kind of lendable item; wire values are the backend's French names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentType {
    Book,
    Dvd,
    Magazine,
    Cd,
    Other(String),
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Book,
        DocumentType::Dvd,
        DocumentType::Magazine,
        DocumentType::Cd,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            DocumentType::Book => "livre",
            DocumentType::Dvd => "dvd",
            DocumentType::Magazine => "magazine",
            DocumentType::Cd => "cd",
            DocumentType::Other(s) => s,
        }
    }

    /// Parse user or wire input; unknown values are kept as `Other`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "livre" | "book" => DocumentType::Book,
            "dvd" => DocumentType::Dvd,
            "magazine" => DocumentType::Magazine,
            "cd" => DocumentType::Cd,
            _ => DocumentType::Other(value.trim().to_string()),
        }
    }

    pub fn requires_isbn(&self) -> bool {
        matches!(self, DocumentType::Book)
    }
}

impl Default for DocumentType {
    fn default() -> Self {
        DocumentType::Other(String::new())
    }
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        DocumentType::parse(&value)
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_string()
    }
}

/// Library member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Abonne {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nom: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub prenom: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub telephone: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub adresse: String,
    #[serde(default, deserialize_with = "dates::datetime_opt")]
    pub date_inscription: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub emprunts_actuels: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub historique_emprunts: Vec<String>,
}

impl Abonne {
    /// "nom prenom", the order used everywhere a member is listed
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nom, self.prenom).trim().to_string()
    }

    pub fn active_loan_count(&self) -> usize {
        self.emprunts_actuels.len()
    }
}

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoanStatus {
    EnCours,
    EnRetard,
    Retourne,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 3] = [LoanStatus::EnCours, LoanStatus::EnRetard, LoanStatus::Retourne];

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::EnCours => "en_cours",
            LoanStatus::EnRetard => "en_retard",
            LoanStatus::Retourne => "retourne",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::EnCours => "En cours",
            LoanStatus::EnRetard => "En retard",
            LoanStatus::Retourne => "Retourné",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "en_cours" | "en-cours" => Some(LoanStatus::EnCours),
            "en_retard" | "en-retard" | "retarde" => Some(LoanStatus::EnRetard),
            "retourne" | "retourné" | "termine" => Some(LoanStatus::Retourne),
            _ => None,
        }
    }
}

impl Default for LoanStatus {
    fn default() -> Self {
        LoanStatus::EnCours
    }
}

impl From<String> for LoanStatus {
    fn from(value: String) -> Self {
        // Unknown values are re-derived from the loan dates after fetching
        LoanStatus::parse(&value).unwrap_or_default()
    }
}

impl From<LoanStatus> for String {
    fn from(value: LoanStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Document fields embedded by the backend in loan listings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    #[serde(default, deserialize_with = "lenient::string")]
    pub titre: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub auteur: String,
}

/// Member fields embedded by the backend in loan listings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbonneSummary {
    #[serde(default, deserialize_with = "lenient::string")]
    pub nom: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub prenom: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub telephone: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emprunt {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub abonne_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub document_id: String,
    #[serde(default, deserialize_with = "dates::datetime_opt")]
    pub date_emprunt: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::datetime_opt")]
    pub date_retour_prevue: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::datetime_opt")]
    pub date_retour_effective: Option<DateTime<Utc>>,
    #[serde(default)]
    pub statut: LoanStatus,
    #[serde(default)]
    pub document: Option<DocumentSummary>,
    #[serde(default)]
    pub abonne: Option<AbonneSummary>,
}

impl Emprunt {
    pub fn document_title(&self) -> &str {
        self.document.as_ref().map(|d| d.titre.as_str()).unwrap_or("")
    }

    pub fn abonne_nom(&self) -> &str {
        self.abonne.as_ref().map(|a| a.nom.as_str()).unwrap_or("")
    }

    pub fn abonne_prenom(&self) -> &str {
        self.abonne.as_ref().map(|a| a.prenom.as_str()).unwrap_or("")
    }

    pub fn abonne_telephone(&self) -> &str {
        self.abonne.as_ref().map(|a| a.telephone.as_str()).unwrap_or("")
    }

    /// "nom prenom" of the borrower, empty when the backend sent no member
    pub fn abonne_full_name(&self) -> String {
        format!("{} {}", self.abonne_nom(), self.abonne_prenom())
            .trim()
            .to_string()
    }

    pub fn is_returned(&self) -> bool {
        self.date_retour_effective.is_some()
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub total_documents: u64,
    #[serde(default)]
    pub total_abonnes: u64,
    #[serde(default)]
    pub emprunts_en_cours: u64,
    #[serde(default)]
    pub emprunts_en_retard: u64,
    #[serde(default)]
    pub total_documents_dispo: Option<u64>,
    #[serde(default)]
    pub total_documents_empruntes: Option<u64>,
}

/// Body sent when creating or updating a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPayload {
    pub titre: String,
    pub auteur: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub isbn: String,
    pub date_publication: String,
    pub disponible: bool,
}

/// Body sent when creating or updating a member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbonnePayload {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: String,
    pub adresse: String,
}

/// Body sent when creating a loan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmpruntPayload {
    pub abonne_id: String,
    pub document_id: String,
}

/// Server-side document filter, mirrors the `GET /documents` query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub doc_type: Option<DocumentType>,
    pub disponible: Option<bool>,
}

impl DocumentQuery {
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.disponible.is_none()
    }
}

/// Format a timestamp as a local calendar date (dd/mm/yyyy), empty when absent
pub fn display_datetime(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.with_timezone(&Local).format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

pub fn display_date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

fn default_true() -> bool {
    true
}

/// Deserializers that accept `null` and mistyped values from the backend
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            _ => Vec::new(),
        })
    }
}

mod dates {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Parse the date formats the backend emits: RFC 3339, RFC 2822
    /// (Flask's default), naive ISO datetimes and bare dates.
    pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    fn from_value(value: Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => parse_datetime(&s),
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            // Mongo extended JSON: {"$date": ...}
            Value::Object(mut map) => map.remove("$date").and_then(from_value),
            _ => None,
        }
    }

    pub fn datetime_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(from_value(Value::deserialize(deserializer)?))
    }

    pub fn naive_date_opt<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(from_value(Value::deserialize(deserializer)?).map(|dt| dt.date_naive()))
    }
}
