//! Bot self-health and readiness

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthReport, Readiness};
use crate::output::{
    color_status, format_timestamp, print_error, print_json, print_success, print_table,
    OutputFormat,
};

/// Row for the component table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

/// Show the health of each bot component
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report: HealthReport = client.get("healthz").await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{} {}", "Bot health:".bold(), color_status(&report.status));
            println!();

            let rows: Vec<ComponentRow> = report
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_else(|| "-".to_string()),
                    last_check: format_timestamp(component.last_check_timestamp),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}

/// Show whether the bot accepts traffic
pub async fn show_readiness(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let readiness: Readiness = client.get("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&readiness)?,
        OutputFormat::Table => {
            if readiness.ready {
                print_success("Bot is ready");
            } else {
                print_error(&format!(
                    "Bot is not ready: {}",
                    readiness.reason.as_deref().unwrap_or("unknown reason")
                ));
            }
        }
    }

    Ok(())
}
