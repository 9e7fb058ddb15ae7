use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::tcp::connection::DEFAULT_MAX_LINE_LENGTH;

/// Top-level server configuration, loaded from tcpchat.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub log: LogSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub address: String,
    /// Greeting sent to every new connection.
    pub welcome_file: String,
    /// Upper bound on concurrent sessions. Unset means unbounded.
    pub max_sessions: Option<usize>,
    pub max_line_length: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8989".into(),
            welcome_file: "welcome.txt".into(),
            max_sessions: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Chat transcript, truncated on startup.
    pub chat_log: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            chat_log: "chatlog.txt".into(),
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse config file {}", path))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LISTEN_ADDRESS") {
            self.server.address = v;
        }
        if let Ok(v) = std::env::var("WELCOME_FILE") {
            self.server.welcome_file = v;
        }
        if let Ok(v) = std::env::var("MAX_SESSIONS")
            && let Ok(max) = v.parse()
        {
            self.server.max_sessions = Some(max);
        }
        if let Ok(v) = std::env::var("MAX_LINE_LENGTH")
            && let Ok(len) = v.parse()
        {
            self.server.max_line_length = len;
        }
        if let Ok(v) = std::env::var("CHAT_LOG") {
            self.log.chat_log = v;
        }
    }

    /// Apply command-line host/port on top of the configured address.
    /// A port alone keeps the configured host; a host alone keeps the port.
    pub fn apply_cli(&mut self, port: Option<u16>, host: Option<&str>) {
        if port.is_none() && host.is_none() {
            return;
        }

        let (current_host, current_port) = split_host_port(&self.server.address);
        let host = host.unwrap_or(current_host);
        let port = port
            .map(|p| p.to_string())
            .unwrap_or_else(|| current_port.to_string());

        self.server.address = format!("{}:{}", host, port);
    }
}

/// Split `host:port`, tolerating bracketed IPv6 hosts.
fn split_host_port(address: &str) -> (&str, &str) {
    match address.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (address, "8989"),
    }
}
