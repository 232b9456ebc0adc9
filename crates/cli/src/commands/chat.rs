//! Sending chat commands to the bot

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, ChatRequest, ChatResponse};
use crate::output::{color_status, print_json, print_warning, OutputFormat};

/// Post `text` as `user` and print the bot's replies
pub async fn say(client: &ApiClient, user: &str, text: &str, format: OutputFormat) -> Result<()> {
    let request = ChatRequest {
        user: user.to_string(),
        text: text.to_string(),
    };
    let response: ChatResponse = client.post("chat", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if !response.handled {
                print_warning("The bot did not recognize that command");
                return Ok(());
            }
            for reply in &response.replies {
                println!("{}", reply);
            }
            if let Some(outcome) = &response.outcome {
                println!();
                println!(
                    "{} {} {}",
                    "→".dimmed(),
                    outcome.kind.cyan(),
                    color_status(&outcome.status)
                );
            }
        }
    }

    Ok(())
}
