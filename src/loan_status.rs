//! Derivation of the displayed loan status from the loan dates
//!
//! The backend stores a `statut` field but only updates it on creation and
//! return. Overdue detection happens here, on the client, and the result is
//! never written back.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Emprunt, LoanStatus};

/// Display color attached to a loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Primary,
    Error,
    Success,
}

impl From<LoanStatus> for StatusColor {
    fn from(status: LoanStatus) -> Self {
        match status {
            LoanStatus::EnCours => StatusColor::Primary,
            LoanStatus::EnRetard => StatusColor::Error,
            LoanStatus::Retourne => StatusColor::Success,
        }
    }
}

/// Derive the status of a loan from its expected and actual return dates.
///
/// A set actual return date always wins. A loan without an expected return
/// date is never overdue.
pub fn derive_status(
    date_retour_prevue: Option<DateTime<Utc>>,
    date_retour_effective: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (LoanStatus, StatusColor) {
    let status = if date_retour_effective.is_some() {
        LoanStatus::Retourne
    } else {
        match date_retour_prevue {
            Some(expected) if expected < now => LoanStatus::EnRetard,
            _ => LoanStatus::EnCours,
        }
    };
    (status, StatusColor::from(status))
}

/// Derive the status of a loan record
pub fn loan_status(emprunt: &Emprunt, now: DateTime<Utc>) -> (LoanStatus, StatusColor) {
    derive_status(emprunt.date_retour_prevue, emprunt.date_retour_effective, now)
}

/// Recompute `statut` for every loan in place; returns how many changed
pub fn refresh_statuses(emprunts: &mut [Emprunt], now: DateTime<Utc>) -> usize {
    let mut changed = 0;
    for emprunt in emprunts.iter_mut() {
        let (status, _) = loan_status(emprunt, now);
        if emprunt.statut != status {
            debug!(
                "Loan {} status {} -> {}",
                emprunt.id,
                emprunt.statut.as_str(),
                status.as_str()
            );
            emprunt.statut = status;
            changed += 1;
        }
    }
    changed
}
