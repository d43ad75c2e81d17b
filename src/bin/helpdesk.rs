use anyhow::Result;
use clap::Parser;

use helpdesk_api::cli::{commands, Cli, Commands};
use helpdesk_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let state = AppState::from_config()
        .await
        .map_err(|e| anyhow::anyhow!("failed to initialize storage: {}", e))?;

    match cli.command {
        Commands::User { cmd } => commands::user::run(cmd, state.store.as_ref()).await,
        Commands::Location { cmd } => commands::location::run(cmd, state.store.as_ref()).await,
    }
}
