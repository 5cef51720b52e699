//! Core traits shared by the terminal UI screens

use crate::export::ExportFormat;
use crate::models::{AbonnePayload, DocumentPayload, EmpruntPayload};
use crate::tui::app::Screen;

/// Backend calls a screen asks the application to run in the background
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// Stats and the three collections, fetched concurrently
    LoadAll,
    LoadStats,
    LoadDocuments,
    LoadAbonnes,
    LoadEmprunts,
    LoadAbonneLoans { abonne_id: String },
    SaveDocument { id: Option<String>, payload: DocumentPayload },
    DeleteDocument { id: String },
    SaveAbonne { id: Option<String>, payload: AbonnePayload },
    DeleteAbonne { id: String },
    CreateEmprunt { payload: EmpruntPayload },
    ReturnEmprunt { id: String },
    DeleteEmprunt { id: String },
}

/// Actions that can be returned from screen event handling
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenAction {
    /// Navigate to a different screen
    NavigateTo(Screen),
    /// Quit the application
    Quit,
    /// Set status message
    SetStatus(String),
    /// Set error message
    SetError(String),
    /// Run a backend call
    Request(ApiRequest),
    /// Ask for y/n confirmation before running a destructive call
    Confirm { message: String, request: ApiRequest },
    /// Export the currently visible rows
    Export(ExportFormat),
    /// Open the new loan picker with the loaded members and documents
    OpenLoanPicker,
    /// No action taken
    None,
}

/// Trait for screens with navigable lists
pub trait Navigable {
    /// Move selection up
    fn navigate_up(&mut self);

    /// Move selection down
    fn navigate_down(&mut self);

    /// Get currently selected index
    fn get_selected_index(&self) -> Option<usize>;

    /// Set selected index
    fn set_selected_index(&mut self, index: Option<usize>);

    /// Get total number of items
    fn get_item_count(&self) -> usize;

    /// Navigate to first item
    fn navigate_to_first(&mut self) {
        if self.get_item_count() > 0 {
            self.set_selected_index(Some(0));
        }
    }

    /// Navigate to last item
    fn navigate_to_last(&mut self) {
        let count = self.get_item_count();
        if count > 0 {
            self.set_selected_index(Some(count - 1));
        }
    }
}

/// Trait for form handling
pub trait FormHandler {
    /// Get current field index
    fn get_current_field(&self) -> usize;

    /// Set current field
    fn set_current_field(&mut self, field: usize);

    /// Get total number of fields
    fn get_field_count(&self) -> usize;

    /// Move to next field
    fn next_field(&mut self) {
        let total = self.get_field_count();
        if total == 0 {
            return;
        }
        let current = self.get_current_field();
        self.set_current_field((current + 1) % total);
    }

    /// Move to previous field
    fn previous_field(&mut self) {
        let total = self.get_field_count();
        if total == 0 {
            return;
        }
        let current = self.get_current_field();
        self.set_current_field(if current == 0 { total - 1 } else { current - 1 });
    }

    /// Handle character input for current field
    fn handle_char_input(&mut self, c: char);

    /// Handle backspace for current field
    fn handle_backspace(&mut self);
}
