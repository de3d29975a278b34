//! Routing types for log events published to the topic exchange.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default name of the durable topic exchange log events go to.
pub const LOG_EXCHANGE: &str = "logs_topic";

/// Prefix shared by every log routing key (`log.INFO`, `log.ERROR`, ...).
pub const LOG_ROUTING_PREFIX: &str = "log";

/// Severity of a published log event. Determines the routing key suffix, so
/// consumers can bind to `log.*` or to a single level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }

    /// Routing key for this severity, e.g. `log.INFO`.
    pub fn routing_key(&self) -> String {
        format!("{}.{}", LOG_ROUTING_PREFIX, self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}
