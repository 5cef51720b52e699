//! List view controllers
//!
//! Each controller owns one fetched collection together with its search
//! query, secondary filter and sort state. The async methods go through a
//! [`LibraryApi`](crate::api::LibraryApi) and only touch local state once
//! the call succeeded; the `apply_*`/`set_*` methods let callers that run
//! requests elsewhere (the terminal UI's spawned tasks) feed results back.

pub mod abonnes;
pub mod documents;
pub mod emprunts;

pub use abonnes::{AbonneSortKey, AbonnesView};
pub use documents::{AvailabilityFilter, DocumentSortKey, DocumentsView};
pub use emprunts::{EmpruntSortKey, EmpruntsView, StatusFilter};

/// Parse a column name typed by the user into a sort key.
/// `keys` pairs each key with its accepted names separated by `|`.
pub(crate) fn parse_key<K: Copy>(value: &str, keys: &[(K, &str)]) -> Option<K> {
    let value = value.trim().to_lowercase().replace('-', "_");
    keys.iter()
        .find(|(_, names)| names.split('|').any(|name| name == value))
        .map(|(key, _)| *key)
}
