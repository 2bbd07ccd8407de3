//! Core configuration types.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::defaults::*;
use super::validation::ValidationError;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ValidationError>),
}

/// Daemon configuration.
///
/// Read once at startup; the link and the command engine only ever read it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Link protocol spoken with the uplink.
    #[serde(default = "default_protocol")]
    pub protocol: ProtocolKind,
    /// Uplink address and credentials.
    pub uplink: UplinkConfig,
    /// Our pseudo-server identity.
    pub server: ServerConfig,
    /// The service client we introduce.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Persistent store locations.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Reconnect backoff.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Dial, write and idle deadlines.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Log output.
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load and validate in one step; any validation problem is fatal.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        super::validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// The service client's identifier.
    ///
    /// Uses `service.uid` when set, otherwise our SID followed by the
    /// protocol's first client suffix.
    pub fn service_uid(&self) -> String {
        match &self.service.uid {
            Some(uid) if !uid.is_empty() => uid.clone(),
            _ => format!("{}{}", self.server.sid, self.protocol.first_client_suffix()),
        }
    }

    /// Host shown for the service client.
    pub fn service_host(&self) -> &str {
        self.service.host.as_deref().unwrap_or(&self.server.name)
    }
}

/// Supported link protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    /// InspIRCd 4 spanning-tree protocol (1206).
    Insp4,
    /// P10 (ircu, Nefarious).
    P10,
}

impl ProtocolKind {
    /// Expected server identifier length.
    pub fn sid_len(self) -> usize {
        match self {
            Self::Insp4 => 3,
            Self::P10 => 2,
        }
    }

    /// Expected client identifier length (server id included).
    pub fn uid_len(self) -> usize {
        match self {
            Self::Insp4 => 9,
            Self::P10 => 5,
        }
    }

    fn first_client_suffix(self) -> &'static str {
        match self {
            Self::Insp4 => "AAAAAA",
            Self::P10 => "AAA",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insp4 => "insp4",
            Self::P10 => "p10",
        }
    }
}

/// Uplink connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UplinkConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Link password sent during the handshake.
    pub password: String,
    #[serde(default)]
    pub tls: bool,
    /// Verify the uplink certificate (only applies when tls = true).
    #[serde(default)]
    pub verify_cert: bool,
}

impl UplinkConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Pseudo-server identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "services.example.org").
    pub name: String,
    #[serde(default = "default_server_desc")]
    pub description: String,
    /// Server identifier: 3 characters for insp4, 2 for p10.
    #[serde(default = "default_sid")]
    pub sid: String,
}

/// Service client identity and command surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Explicit client identifier; derived from the SID when absent.
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default = "default_service_nick")]
    pub nick: String,
    #[serde(default = "default_service_user")]
    pub user: String,
    /// Host shown for the service; defaults to the server name.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_service_realname")]
    pub realname: String,
    /// Marker that introduces a command in channel messages.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: char,
    /// Channels joined once the uplink finishes its burst.
    #[serde(default = "default_service_channels")]
    pub channels: Vec<String>,
    /// Suffix for the display host applied on login: `<account>.<suffix>`.
    #[serde(default = "default_user_host_suffix")]
    pub user_host_suffix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            uid: None,
            nick: default_service_nick(),
            user: default_service_user(),
            host: None,
            realname: default_service_realname(),
            command_prefix: default_command_prefix(),
            channels: default_service_channels(),
            user_host_suffix: default_user_host_suffix(),
        }
    }
}

/// JSON store paths.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_accounts_path")]
    pub accounts: String,
    #[serde(default = "default_access_path")]
    pub access: String,
    #[serde(default = "default_registry_path")]
    pub registry: String,
    #[serde(default = "default_suspensions_path")]
    pub suspensions: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts_path(),
            access: default_access_path(),
            registry: default_registry_path(),
            suspensions: default_suspensions_path(),
        }
    }
}

impl StorageConfig {
    /// Rebase every relative path onto `dir`.
    pub fn rooted_at(&self, dir: &Path) -> Self {
        let join = |p: &str| dir.join(p).to_string_lossy().into_owned();
        Self {
            accounts: join(&self.accounts),
            access: join(&self.access),
            registry: join(&self.registry),
            suspensions: join(&self.suspensions),
        }
    }
}

/// Exponential reconnect backoff.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// First delay after a failure, in seconds.
    #[serde(default = "default_reconnect_base")]
    pub base_secs: u64,
    /// Ceiling for the doubled delay, in seconds.
    #[serde(default = "default_reconnect_max")]
    pub max_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_secs: default_reconnect_base(),
            max_secs: default_reconnect_max(),
        }
    }
}

impl ReconnectConfig {
    pub fn base(&self) -> Duration {
        Duration::from_secs(self.base_secs)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_secs)
    }
}

/// Link deadlines.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_secs: u64,
    /// Seconds without any inbound line before the link is declared dead.
    #[serde(default = "default_idle_timeout")]
    pub idle_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_timeout(),
            write_secs: default_write_timeout(),
            idle_secs: default_idle_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
