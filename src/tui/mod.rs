//! Terminal user interface
//!
//! Full-screen ratatui front end over the same views as the command line:
//! dashboard, documents, subscribers, loans and help. Backend calls run as
//! spawned tasks and report back to the UI loop over a channel.

pub mod app;
pub mod components;
pub mod events;
pub mod screens;
pub mod traits;
pub mod ui;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    cursor::Show,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};

use crate::api::LibraryApi;
use crate::config::Config;

pub use app::{App, Screen};
pub use events::AppEvent;

/// Leave the alternate screen and show the cursor again
pub fn restore_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(out, LeaveAlternateScreen, DisableMouseCapture, Show)
}

/// Puts the terminal back in cooked mode when dropped, including while
/// unwinding from a panic in the UI loop
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        }
        if let Err(e) = restore_screen(&mut io::stdout()) {
            warn!("Failed to restore the terminal: {}", e);
        }
    }
}

/// Set up the terminal, run the application loop and restore the terminal
pub async fn run_tui(config: Config, api: Arc<dyn LibraryApi>) -> Result<()> {
    let guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut app = App::new(config, api);
    info!("Starting main application loop");
    let result = app.run(&mut terminal).await;
    drop(guard);

    match &result {
        Ok(()) => info!("TUI exited successfully"),
        Err(e) => error!("TUI encountered an error: {:#}", e),
    }
    result
}
