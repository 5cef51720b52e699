//! Administration client for a media library backend
//!
//! Documents, subscribers and loans are managed through a REST API; this
//! crate provides the API client, client-side list filtering and sorting,
//! loan status derivation, form validation, PDF/CSV exports, a command line
//! and a terminal UI.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod export;
pub mod forms;
pub mod listing;
pub mod loan_status;
pub mod logging;
pub mod models;
pub mod text;
pub mod tui;
pub mod views;
