pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::client::ClientError;

#[derive(Parser)]
#[command(name = "mindreveal")]
#[command(about = "MindReveal CLI - Session management for the MindReveal API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "MINDREVEAL_SERVER",
        default_value = "http://localhost:3000",
        help = "Base URL of the API server"
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },
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

    let result = match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, &cli.server, output_format.clone()).await,
    };

    // JSON callers get the failure on stdout as well
    if let (Err(e), OutputFormat::Json) = (&result, &output_format) {
        let code = match e.downcast_ref::<ClientError>() {
            Some(ClientError::Status { code, .. }) => code.as_deref(),
            _ => None,
        };
        utils::output_error(&output_format, &e.to_string(), code)?;
    }

    result
}
