//! Settings type definitions.
//!
//! All sections use camelCase on disk and accept partial JSON: missing
//! fields take their compiled default.

use huddle_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Admission and identity settings.
    pub session: SessionSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection admission settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Cookie holding the login session ID.
    pub session_cookie: String,
    /// Cookie holding the guest user ID.
    pub guest_cookie: String,
    /// Incorrect join-code submissions tolerated before closing (0 = unlimited).
    pub join_code_max_attempts: u32,
    /// Whether one user may hold several live sessions in the same arena.
    pub allow_multiple_sessions: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_cookie: "session_id".to_string(),
            guest_cookie: "user_id".to_string(),
            join_code_max_attempts: 0,
            allow_multiple_sessions: false,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter (`RUST_LOG` overrides it).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
