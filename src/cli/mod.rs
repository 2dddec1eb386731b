pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "upload-console")]
#[command(about = "Upload console - sessions, route guard and devtools protection")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Evaluate console routes against the current session")]
    Route {
        #[command(subcommand)]
        cmd: commands::route::RouteCommands,
    },

    #[command(about = "Developer-tools password management")]
    Devtools {
        #[command(subcommand)]
        cmd: commands::devtools::DevtoolsCommands,
    },

    #[command(about = "Run the host and renderer guards in-process, driven from stdin")]
    Shell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Route { cmd } => commands::route::handle(cmd, output_format).await,
        Commands::Devtools { cmd } => commands::devtools::handle(cmd, output_format).await,
        Commands::Shell => commands::shell::handle(output_format).await,
    }
}
