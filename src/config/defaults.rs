//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Uplink Defaults
// =============================================================================

pub fn default_port() -> u16 {
    7000
}

pub fn default_protocol() -> super::ProtocolKind {
    super::ProtocolKind::Insp4
}

// =============================================================================
// Server / Service Identity Defaults
// =============================================================================

pub fn default_sid() -> String {
    "042".to_string()
}

pub fn default_server_desc() -> String {
    "IRC Services".to_string()
}

pub fn default_service_nick() -> String {
    "Q".to_string()
}

pub fn default_service_user() -> String {
    "qserv".to_string()
}

pub fn default_service_realname() -> String {
    "Channel Service".to_string()
}

pub fn default_command_prefix() -> char {
    '!'
}

pub fn default_service_channels() -> Vec<String> {
    vec!["#services".to_string()]
}

pub fn default_user_host_suffix() -> String {
    "users.example.org".to_string()
}

// =============================================================================
// Storage Defaults
// =============================================================================

pub fn default_accounts_path() -> String {
    "accounts.json".to_string()
}

pub fn default_access_path() -> String {
    "chan_access.json".to_string()
}

pub fn default_registry_path() -> String {
    "state.json".to_string()
}

pub fn default_suspensions_path() -> String {
    "suspended.json".to_string()
}

// =============================================================================
// Reconnect / Timeout Defaults
// =============================================================================

pub fn default_reconnect_base() -> u64 {
    2
}

pub fn default_reconnect_max() -> u64 {
    300
}

pub fn default_connect_timeout() -> u64 {
    10
}

pub fn default_write_timeout() -> u64 {
    10
}

pub fn default_idle_timeout() -> u64 {
    600
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_level() -> String {
    "info".to_string()
}
