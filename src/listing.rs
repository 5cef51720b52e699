//! Client-side search and column sorting over fetched collections

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};

/// Sort direction of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

/// Current sort column and direction of a list
#[derive(Debug, Clone, PartialEq)]
pub struct SortState<K> {
    pub key: Option<K>,
    pub direction: SortDirection,
}

impl<K: Copy + PartialEq> SortState<K> {
    /// Keep the backend order
    pub fn unsorted() -> Self {
        Self {
            key: None,
            direction: SortDirection::Asc,
        }
    }

    pub fn by(key: K, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }

    /// Column header click: the active ascending column flips to
    /// descending, anything else sorts ascending on the requested key.
    pub fn request(&mut self, key: K) {
        let direction = if self.key == Some(key) && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        self.key = Some(key);
        self.direction = direction;
    }

    /// Arrow for a column header, empty for inactive columns
    pub fn indicator(&self, key: K) -> &'static str {
        if self.key == Some(key) {
            self.direction.arrow()
        } else {
            ""
        }
    }
}

/// Comparable value extracted from a record for one sort key.
///
/// Variant order puts missing values first when ascending.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Missing,
    Bool(bool),
    Number(i64),
    Text(String),
}

impl SortValue {
    pub fn text(value: &str) -> Self {
        SortValue::Text(value.to_string())
    }

    /// Dates compare as millisecond timestamps
    pub fn timestamp(value: Option<DateTime<Utc>>) -> Self {
        value
            .map(|dt| SortValue::Number(dt.timestamp_millis()))
            .unwrap_or(SortValue::Missing)
    }

    pub fn date(value: Option<NaiveDate>) -> Self {
        value
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| SortValue::Number(dt.and_utc().timestamp_millis()))
            .unwrap_or(SortValue::Missing)
    }
}

/// Records that can be matched by the free-text search box
pub trait Searchable {
    /// Fields the search box looks into
    fn search_fields(&self) -> Vec<Cow<'_, str>>;
}

/// Records that can be ordered by a column key
pub trait Sortable {
    type Key: Copy + PartialEq;

    fn sort_value(&self, key: Self::Key) -> SortValue;
}

/// Case-insensitive substring match against any searchable field
pub fn matches_query<T: Searchable>(record: &T, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    record
        .search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Keep the records matching `query`, preserving input order
pub fn filter_records<'a, T: Searchable>(records: &'a [T], query: &str) -> Vec<&'a T> {
    records
        .iter()
        .filter(|record| matches_query(*record, query))
        .collect()
}

/// Compare two records for a sort state
pub fn compare<T: Sortable>(a: &T, b: &T, state: &SortState<T::Key>) -> Ordering {
    let Some(key) = state.key else {
        return Ordering::Equal;
    };
    let ordering = a.sort_value(key).cmp(&b.sort_value(key));
    match state.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Sort record references in place; ties keep their input order
pub fn sort_records<T: Sortable>(records: &mut [&T], state: &SortState<T::Key>) {
    if state.key.is_none() {
        return;
    }
    records.sort_by(|a, b| compare(*a, *b, state));
}
