//! Configuration validation.
//!
//! Validates configuration at startup to catch identifier and link errors
//! before the first connection attempt.

use super::{Config, ProtocolKind};
use thiserror::Error;

/// P10 numeric alphabet.
const P10_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789[]";

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("server.name must contain a '.', got '{0}'")]
    InvalidServerName(String),
    #[error("server.sid must be exactly {expected} characters for {protocol}, got {actual}")]
    InvalidSidLength {
        protocol: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("server.sid has an invalid format for {protocol}: '{sid}'")]
    InvalidSidFormat { protocol: &'static str, sid: String },
    #[error("service.uid must be {expected} characters starting with the sid, got '{uid}'")]
    InvalidServiceUid { expected: usize, uid: String },
    #[error("service.nick is required")]
    MissingServiceNick,
    #[error("service.command_prefix must be a printable non-space character")]
    InvalidCommandPrefix,
    #[error("uplink.host is required")]
    MissingUplinkHost,
    #[error("uplink.password must be non-empty and contain no spaces")]
    InvalidLinkPassword,
    #[error("reconnect.base_secs must be > 0 and <= reconnect.max_secs")]
    InvalidBackoff,
    #[error("timeouts.{0} must be > 0")]
    ZeroTimeout(&'static str),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Server identity
    let name = &config.server.name;
    if name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    } else if !name.contains('.') || name.contains(' ') {
        errors.push(ValidationError::InvalidServerName(name.clone()));
    }

    let protocol = config.protocol;
    let sid = &config.server.sid;
    if sid.len() != protocol.sid_len() {
        errors.push(ValidationError::InvalidSidLength {
            protocol: protocol.as_str(),
            expected: protocol.sid_len(),
            actual: sid.len(),
        });
    } else if !sid_format_ok(protocol, sid) {
        errors.push(ValidationError::InvalidSidFormat {
            protocol: protocol.as_str(),
            sid: sid.clone(),
        });
    }

    // Service identity
    if let Some(uid) = config.service.uid.as_deref().filter(|u| !u.is_empty())
        && (uid.len() != protocol.uid_len() || !uid.starts_with(sid.as_str()))
    {
        errors.push(ValidationError::InvalidServiceUid {
            expected: protocol.uid_len(),
            uid: uid.to_string(),
        });
    }
    if config.service.nick.trim().is_empty() {
        errors.push(ValidationError::MissingServiceNick);
    }
    let prefix = config.service.command_prefix;
    if prefix.is_whitespace() || prefix.is_control() {
        errors.push(ValidationError::InvalidCommandPrefix);
    }

    // Uplink
    if config.uplink.host.is_empty() {
        errors.push(ValidationError::MissingUplinkHost);
    }
    if config.uplink.password.is_empty() || config.uplink.password.contains(' ') {
        errors.push(ValidationError::InvalidLinkPassword);
    }

    // Timers
    let backoff = &config.reconnect;
    if backoff.base_secs == 0 || backoff.base_secs > backoff.max_secs {
        errors.push(ValidationError::InvalidBackoff);
    }
    for (field, value) in [
        ("connect_secs", config.timeouts.connect_secs),
        ("write_secs", config.timeouts.write_secs),
        ("idle_secs", config.timeouts.idle_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn sid_format_ok(protocol: ProtocolKind, sid: &str) -> bool {
    match protocol {
        // TS6-style: [0-9][A-Z0-9][A-Z0-9]
        ProtocolKind::Insp4 => {
            let chars: Vec<char> = sid.chars().collect();
            chars[0].is_ascii_digit()
                && (chars[1].is_ascii_uppercase() || chars[1].is_ascii_digit())
                && (chars[2].is_ascii_uppercase() || chars[2].is_ascii_digit())
        }
        ProtocolKind::P10 => sid.chars().all(|c| P10_ALPHABET.contains(c)),
    }
}
