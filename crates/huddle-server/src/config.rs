//! Server configuration.

use huddle_settings::HuddleSettings;

use crate::websocket::Liveness;

/// Configuration for the huddle server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Cookie carrying the login session ID.
    pub session_cookie: String,
    /// Cookie carrying the guest user ID.
    pub guest_cookie: String,
    /// Wrong join-code submissions allowed per connection; zero is unlimited.
    pub join_code_max_attempts: u32,
    /// Ping, pong, and write timings.
    pub liveness: Liveness,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            session_cookie: "session_id".into(),
            guest_cookie: "user_id".into(),
            join_code_max_attempts: 0,
            liveness: Liveness::default(),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &HuddleSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            session_cookie: settings.session.session_cookie.clone(),
            guest_cookie: settings.session.guest_cookie.clone(),
            join_code_max_attempts: settings.session.join_code_max_attempts,
            liveness: Liveness::default(),
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:0");
        assert_eq!(config.session_cookie, "session_id");
        assert_eq!(config.guest_cookie, "user_id");
        assert_eq!(config.join_code_max_attempts, 0);
    }

    #[test]
    fn from_settings_copies_fields() {
        let mut settings = HuddleSettings::default();
        settings.server.host = "0.0.0.0".into();
        settings.server.port = 9090;
        settings.session.session_cookie = "sid".into();
        settings.session.join_code_max_attempts = 3;

        let config = ServerConfig::from_settings(&settings);
        assert_eq!(config.bind_addr(), "0.0.0.0:9090");
        assert_eq!(config.session_cookie, "sid");
        assert_eq!(config.guest_cookie, "user_id");
        assert_eq!(config.join_code_max_attempts, 3);
        assert_eq!(config.liveness, Liveness::default());
    }
}
