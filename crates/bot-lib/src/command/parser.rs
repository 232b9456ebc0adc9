//! Chat text to command parsing
//!
//! Matching is case-insensitive. A leading bot mention (`@bot`, `bot:`) is
//! ignored and most commands accept the application name as an optional
//! token (`deploy porttrack canary 30%`). Validation happens here so that a
//! rejected command never reaches the backend.

use crate::config::ChatOpsConfig;
use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Bounds accepted by `promote to <pct>%`
pub const PROMOTE_MIN_PERCENT: u32 = 1;
pub const PROMOTE_MAX_PERCENT: u32 = 100;

/// Window used by `show metrics` without `last <N>h`
pub const DEFAULT_METRICS_WINDOW_HOURS: u32 = 1;

static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:@\S+[:,]?\s+|[^\s:]+:\s+)").expect("Invalid regex"));

static CANARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^deploy(?:\s+(?P<app>\S+))?\s+canary\s+(?P<pct>[^\s%]+)%?$")
        .expect("Invalid regex")
});

static PROMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^promote(?:\s+(?P<app>\S+))?\s+to\s+(?P<pct>[^\s%]+)%?$")
        .expect("Invalid regex")
});

static ROLLBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^rollback(?:\s+(?P<app>\S+))?$").expect("Invalid regex"));

static STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^status(?:\s+(?P<app>\S+))?$").expect("Invalid regex"));

static METRICS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^show(?:\s+(?P<app>\S+))?\s+metrics(?:\s+last\s+(?P<hours>\S+?)h?)?$")
        .expect("Invalid regex")
});

static RESTART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^restart\s+service\s+(?P<service>\S+)$").expect("Invalid regex")
});

static HEALTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^health\s*check(?:\s+(?P<app>\S+))?$").expect("Invalid regex")
});

/// A validated chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartCanary { percentage: u32 },
    Promote { percentage: u32 },
    Rollback,
    Status,
    ShowMetrics { window_hours: u32 },
    RestartService { service: String },
    HealthCheck,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::StartCanary { .. } => CommandKind::StartCanary,
            Command::Promote { .. } => CommandKind::Promote,
            Command::Rollback => CommandKind::Rollback,
            Command::Status => CommandKind::Status,
            Command::ShowMetrics { .. } => CommandKind::ShowMetrics,
            Command::RestartService { .. } => CommandKind::RestartService,
            Command::HealthCheck => CommandKind::HealthCheck,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    StartCanary,
    Promote,
    Rollback,
    Status,
    ShowMetrics,
    RestartService,
    HealthCheck,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::StartCanary => "start_canary",
            CommandKind::Promote => "promote",
            CommandKind::Rollback => "rollback",
            CommandKind::Status => "status",
            CommandKind::ShowMetrics => "show_metrics",
            CommandKind::RestartService => "restart_service",
            CommandKind::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of parsing text addressed to the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// Recognized, but failed validation
    Rejected {
        kind: CommandKind,
        error: ValidationError,
    },
}

pub struct CommandParser {
    config: Arc<ChatOpsConfig>,
}

impl CommandParser {
    pub fn new(config: Arc<ChatOpsConfig>) -> Self {
        Self { config }
    }

    /// Parse one chat message. Returns `None` when the text is not a command.
    pub fn parse(&self, text: &str) -> Option<Parsed> {
        let text = text.trim();
        let text = MENTION.replace(text, "");
        let text = text.trim();

        let (kind, result) = if let Some(caps) = CANARY.captures(text) {
            (CommandKind::StartCanary, self.canary(&caps))
        } else if let Some(caps) = PROMOTE.captures(text) {
            (CommandKind::Promote, self.promote(&caps))
        } else if let Some(caps) = ROLLBACK.captures(text) {
            (
                CommandKind::Rollback,
                self.check_app(&caps).map(|_| Command::Rollback),
            )
        } else if let Some(caps) = STATUS.captures(text) {
            (
                CommandKind::Status,
                self.check_app(&caps).map(|_| Command::Status),
            )
        } else if let Some(caps) = METRICS.captures(text) {
            (CommandKind::ShowMetrics, self.metrics(&caps))
        } else if let Some(caps) = RESTART.captures(text) {
            (CommandKind::RestartService, self.restart(&caps))
        } else if let Some(caps) = HEALTH.captures(text) {
            (
                CommandKind::HealthCheck,
                self.check_app(&caps).map(|_| Command::HealthCheck),
            )
        } else {
            return None;
        };

        Some(match result {
            Ok(command) => Parsed::Command(command),
            Err(error) => Parsed::Rejected { kind, error },
        })
    }

    fn check_app(&self, caps: &Captures<'_>) -> Result<(), ValidationError> {
        match caps.name("app") {
            Some(app) if !app.as_str().eq_ignore_ascii_case(&self.config.application) => {
                Err(ValidationError::UnknownApplication {
                    name: app.as_str().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn canary(&self, caps: &Captures<'_>) -> Result<Command, ValidationError> {
        self.check_app(caps)?;
        let raw = parse_number("percentage", &caps["pct"])?;
        let percentage = check_range(
            raw,
            self.config.canary_min_percent,
            self.config.canary_max_percent,
        )?;
        Ok(Command::StartCanary { percentage })
    }

    fn promote(&self, caps: &Captures<'_>) -> Result<Command, ValidationError> {
        self.check_app(caps)?;
        let raw = parse_number("percentage", &caps["pct"])?;
        let percentage = check_range(raw, PROMOTE_MIN_PERCENT, PROMOTE_MAX_PERCENT)?;
        Ok(Command::Promote { percentage })
    }

    fn metrics(&self, caps: &Captures<'_>) -> Result<Command, ValidationError> {
        self.check_app(caps)?;
        let requested = match caps.name("hours") {
            Some(raw) => parse_number("hours", raw.as_str())?,
            None => u64::from(DEFAULT_METRICS_WINDOW_HOURS),
        };
        let max = self.config.max_metrics_window_hours;
        match u32::try_from(requested) {
            Ok(window_hours) if window_hours >= 1 && window_hours <= max => {
                Ok(Command::ShowMetrics { window_hours })
            }
            _ => Err(ValidationError::WindowOutOfRange {
                value: requested,
                max,
            }),
        }
    }

    fn restart(&self, caps: &Captures<'_>) -> Result<Command, ValidationError> {
        let name = &caps["service"];
        if !self.config.is_restartable(name) {
            return Err(ValidationError::ServiceNotAllowed {
                name: name.to_string(),
                allowed: self.config.restartable_services.clone(),
            });
        }
        Ok(Command::RestartService {
            service: name.to_lowercase(),
        })
    }
}

/// Whole numbers too large for u64 saturate so they still fail range checks
fn parse_number(field: &'static str, raw: &str) -> Result<u64, ValidationError> {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(raw.parse().unwrap_or(u64::MAX));
    }
    Err(ValidationError::MalformedNumber {
        field,
        raw: raw.to_string(),
    })
}

fn check_range(value: u64, min: u32, max: u32) -> Result<u32, ValidationError> {
    match u32::try_from(value) {
        Ok(percentage) if percentage >= min && percentage <= max => Ok(percentage),
        _ => Err(ValidationError::PercentageOutOfRange { value, min, max }),
    }
}
