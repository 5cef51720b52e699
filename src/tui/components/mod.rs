//! Reusable UI components shared by the screens

pub mod confirm_dialog;
pub mod form_field;
pub mod record_table;
pub mod status_display;

pub use confirm_dialog::{ConfirmDialog, ConfirmOutcome};
pub use form_field::{Form, FormField, FormFieldType};
pub use record_table::RecordTable;
pub use status_display::{StatusDisplay, StatusMessage, StatusType};
