use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::util::SubscriberInitExt;

use mediatheque::api::{ApiClient, LibraryApi};
use mediatheque::cli::{Cli, Commands};
use mediatheque::config::Config;
use mediatheque::{commands, logging, tui};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_appender = tracing_appender::rolling::never(".", logging::LOG_FILE);
    let to_stderr = !matches!(cli.command, Commands::Tui);
    logging::subscriber(&logging::directives_from_env(), file_appender, to_stderr).init();

    let mut config = Config::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api.base_url = api_url.trim_end_matches('/').to_string();
    }
    config.validate()?;

    let client = ApiClient::new(&config.api)?;
    info!("Using backend at {}", client.base_url());
    let api: Arc<dyn LibraryApi> = Arc::new(client);

    let result = match &cli.command {
        Commands::Tui => {
            info!("Launching TUI interface");
            tui::run_tui(config, api).await
        }
        command => commands::run(command, api.as_ref(), &config).await,
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}
