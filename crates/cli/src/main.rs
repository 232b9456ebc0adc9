//! PortTrack ChatOps CLI
//!
//! A command-line tool for talking to the chat-ops bot: send chat commands
//! from a terminal and inspect the bot's own health.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{chat, health};

/// PortTrack ChatOps CLI
#[derive(Parser)]
#[command(name = "opsctl")]
#[command(author, version, about = "CLI for the PortTrack ChatOps bot", long_about = None)]
pub struct Cli {
    /// Bot endpoint URL (can also be set via OPSCTL_BOT_URL env var)
    #[arg(long, env = "OPSCTL_BOT_URL", default_value = "http://localhost:8080")]
    pub bot_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a chat command, e.g. `opsctl say deploy canary 10%`
    Say {
        /// Command text
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,

        /// Chat identity to send as
        #[arg(long, short, env = "OPSCTL_USER")]
        user: Option<String>,
    },

    /// Show the bot's component health
    Health,

    /// Show whether the bot is ready
    Ready,
}

fn default_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "cli-user".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.bot_url)?;

    // Execute command
    match cli.command {
        Commands::Say { text, user } => {
            let user = user.unwrap_or_else(default_user);
            chat::say(&client, &user, &text.join(" "), cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
        Commands::Ready => {
            health::show_readiness(&client, cli.format).await?;
        }
    }

    Ok(())
}
