pub mod settings;

use crate::protocol::codec::DEFAULT_MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Well-known SSPQ port.
pub const SSPQ_PORT: u16 = 8888;

/// Broker verbosity, ordered by rank: `Fail < Warn < Info < Dbug`.
///
/// Only gates diagnostic output; protocol decisions never consult it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[serde(alias = "FAIL")]
    Fail = 1,
    #[serde(alias = "WARN")]
    Warn = 2,
    #[serde(alias = "INFO")]
    #[default]
    Info = 3,
    #[serde(alias = "DBUG")]
    Dbug = 4,
}

impl LogLevel {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Fail => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Dbug => tracing::Level::DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(LogLevel::Fail),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "dbug" => Ok(LogLevel::Dbug),
            _ => Err(format!("{} is NOT a valid loglevel", s)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Fail => "fail",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Dbug => "dbug",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: LogLevel,
    /// When false, exhausted messages are dropped instead of dead-lettered.
    pub dead_letter_queue: bool,
    pub max_frame_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: SSPQ_PORT,
            log_level: LogLevel::Info,
            dead_letter_queue: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl BrokerConfig {
    /// Drop exhausted messages instead of routing them to the dead-letter sink
    pub fn without_dead_letter_queue(mut self) -> Self {
        self.dead_letter_queue = false;
        self
    }

    pub fn with_address(mut self, host: &str, port: u16) -> Self {
        self.host = host.to_string();
        self.port = port;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.max_frame_size == 0 {
            return Err("max_frame_size must be > 0".to_string());
        }
        Ok(())
    }
}
