//! Error hierarchy for qserv.
//!
//! One enum per layer. Transport errors end a link session and are
//! recovered by reconnecting; handler errors are logged and isolated;
//! denials become a one-line reply to whoever issued the command.

use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Link Errors (transport and handshake)
// ============================================================================

/// Errors that end a link session.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("dial {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial {addr} timed out after {after:?}")]
    DialTimeout { addr: String, after: Duration },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("no data from uplink for {0:?}")]
    IdleTimeout(Duration),

    #[error("connection closed by uplink")]
    Closed,

    #[error("link is not connected")]
    NotConnected,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("invalid link state transition {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("uplink sent ERROR: {0}")]
    Remote(String),

    #[error("shutdown requested")]
    Shutdown,

    #[error("protocol error: {0}")]
    Protocol(#[from] qserv_proto::ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Dial { .. } => "dial",
            Self::DialTimeout { .. } => "dial_timeout",
            Self::Tls(_) => "tls",
            Self::WriteTimeout(_) => "write_timeout",
            Self::IdleTimeout(_) => "idle_timeout",
            Self::Closed => "closed",
            Self::NotConnected => "not_connected",
            Self::Handshake(_) => "handshake",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Remote(_) => "remote_error",
            Self::Shutdown => "shutdown",
            Self::Protocol(_) => "protocol",
            Self::Io(_) => "io",
        }
    }
}

// ============================================================================
// Store Errors (persistence)
// ============================================================================

/// Errors from the JSON stores.
///
/// A `Save` error after a mutation means the change is applied in memory
/// but not yet on disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to save {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Handler Errors (event bus)
// ============================================================================

/// Errors returned by event bus handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters for {0}")]
    NeedMoreParams(&'static str),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NeedMoreParams(_) => "need_more_params",
            Self::Link(_) => "link",
            Self::Store(_) => "store",
            Self::Internal(_) => "internal_error",
        }
    }
}

// ============================================================================
// Denials (authorization and command faults)
// ============================================================================

/// A refused command. `Display` is the reply line sent to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Channel {0} is suspended.")]
    ChannelSuspended(String),

    #[error("You are not logged in.")]
    NotLoggedIn,

    #[error("Your account is suspended: {0}")]
    AccountSuspended(String),

    #[error("Need level {needed}+ on {channel} to {action}.")]
    InsufficientLevel {
        channel: String,
        needed: u16,
        action: &'static str,
    },

    #[error("Only the channel owner or level 400+ can change access on {0}.")]
    OwnerRequired(String),

    #[error("IRCop only.")]
    OperOnly,

    #[error("{nick} is not visible in {channel}.")]
    NotVisible { nick: String, channel: String },

    #[error("{0} is not active on the network.")]
    ChannelNotActive(String),

    #[error("{0} is not registered.")]
    ChannelNotRegistered(String),

    #[error("{0} is already registered.")]
    ChannelAlreadyRegistered(String),

    #[error("Account {0} already exists.")]
    AccountExists(String),

    #[error("No such account: {0}")]
    NoSuchAccount(String),

    #[error("Invalid account or password.")]
    BadCredentials,

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Internal error, try again later.")]
    Internal,
}

impl Denial {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ChannelSuspended(_) => "channel_suspended",
            Self::NotLoggedIn => "not_logged_in",
            Self::AccountSuspended(_) => "account_suspended",
            Self::InsufficientLevel { .. } => "insufficient_level",
            Self::OwnerRequired(_) => "owner_required",
            Self::OperOnly => "oper_only",
            Self::NotVisible { .. } => "not_visible",
            Self::ChannelNotActive(_) => "channel_not_active",
            Self::ChannelNotRegistered(_) => "channel_not_registered",
            Self::ChannelAlreadyRegistered(_) => "channel_already_registered",
            Self::AccountExists(_) => "account_exists",
            Self::NoSuchAccount(_) => "no_such_account",
            Self::BadCredentials => "bad_credentials",
            Self::Usage(_) => "usage",
            Self::Invalid(_) => "invalid",
            Self::UnknownCommand(_) => "unknown_command",
            Self::Internal => "internal",
        }
    }
}
