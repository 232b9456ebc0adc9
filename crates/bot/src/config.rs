//! Bot process configuration

use anyhow::{bail, Context, Result};
use bot_lib::config::ChatOpsConfig;
use bot_lib::HttpBackendConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default configuration file, read when present
pub const DEFAULT_CONFIG_FILE: &str = "chatops.toml";

/// Environment variable naming an alternative configuration file
pub const CONFIG_FILE_ENV: &str = "CHATOPS_CONFIG";

/// Which infrastructure backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Deployment control API over HTTP
    Http,
    /// In-process sandbox, nothing leaves the bot
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,

    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            endpoint: default_backend_endpoint(),
            timeout_secs: default_timeout_secs(),
            api_token: None,
        }
    }
}

impl BackendSettings {
    pub fn http_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            endpoint: self.endpoint.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            api_token: self.api_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    /// Chat incoming-webhook URL; notifications are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Name used in logs
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Port for the chat, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub chatops: ChatOpsConfig,
}

fn default_bot_name() -> String {
    "porttrack-bot".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_backend_kind() -> BackendKind {
    BackendKind::Http
}

fn default_backend_endpoint() -> String {
    "http://deploy-api:9000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            api_port: default_api_port(),
            backend: BackendSettings::default(),
            notifications: NotificationSettings::default(),
            chatops: ChatOpsConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from the config file and environment.
    ///
    /// The file named by `CHATOPS_CONFIG` (or `chatops.toml`) is optional.
    /// Environment variables use the `CHATOPS` prefix with `__` between
    /// nesting levels, e.g. `CHATOPS_CHATOPS__CHANNELS__ALERTS`.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&file))
    }

    pub fn load_from(file: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(
                config::Environment::with_prefix("CHATOPS")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("chatops.restartable_services")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let config: BotConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chatops.validate()?;
        if self.backend.timeout_secs == 0 || self.notifications.timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.backend.kind, BackendKind::Http);
        assert!(config.notifications.webhook_url.is_none());
        assert_eq!(config.chatops.canary_max_percent, 50);
        assert_eq!(config.notifications.timeout_secs, 30);
    }

    #[test]
    fn test_file_without_notifications_section_loads() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "api_port = 9191\n\n[backend]\nkind = \"memory\"").unwrap();

        let config = BotConfig::load_from(file.path()).unwrap();

        assert_eq!(config.api_port, 9191);
        assert_eq!(config.notifications.timeout_secs, 30);
        assert!(config.notifications.webhook_url.is_none());
    }

    #[test]
    fn test_file_overrides_nested_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r##"
bot_name = "harbor-bot"
api_port = 9090

[backend]
kind = "memory"

[notifications]
webhook_url = "https://chat.example.com/hooks/abc"

[chatops]
application = "harbor"
restartable_services = ["nginx", "worker"]

[chatops.channels]
alerts = "#harbor-alerts"
"##
        )
        .unwrap();

        let config = BotConfig::load_from(file.path()).unwrap();

        assert_eq!(config.bot_name, "harbor-bot");
        assert_eq!(config.api_port, 9090);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("https://chat.example.com/hooks/abc")
        );
        assert_eq!(config.chatops.application, "harbor");
        assert!(config.chatops.is_restartable("worker"));
        assert_eq!(config.chatops.channels.alerts, "#harbor-alerts");
        assert_eq!(config.chatops.channels.ops, "#porttrack-ops");
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[chatops]\ncanary_min_percent = 80").unwrap();

        assert!(BotConfig::load_from(file.path()).is_err());
    }
}
