pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "Helpdesk CLI - administration for the ticket tracking API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "User account administration")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Location hierarchy administration")]
    Location {
        #[command(subcommand)]
        cmd: commands::location::LocationCommands,
    },
}
