//! Command side effects.
//!
//! Commands return effects instead of writing to the link, so their
//! decisions can be tested without a connection. [`apply_effects`] turns
//! them into protocol lines in order.

use crate::error::LinkError;
use crate::link::LineSink;
use crate::protocol::Protocol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEffect {
    /// One line of acknowledgement to the requester's surface.
    Reply(String),

    /// Mark `uid` as logged in to `account`.
    AccountIdentify { uid: String, account: String },

    /// Revert the protocol-level login marking of `uid`.
    AccountClear { uid: String },

    /// Change the displayed host of `uid`.
    SetHost { uid: String, host: String },

    /// Server-sourced member mode change (`+o`, `-v`, ...).
    ChannelMode {
        channel: String,
        ts: i64,
        change: &'static str,
        target_uid: String,
    },

    /// Service client joins `channel` with operator status.
    Join { channel: String, ts: i64 },

    /// Service client leaves `channel`.
    Part { channel: String, reason: String },
}

impl ServiceEffect {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    /// Protocol lines for this effect. Replies go to `reply_to`.
    pub fn to_lines(&self, protocol: &dyn Protocol, reply_to: &str) -> Vec<String> {
        match self {
            Self::Reply(text) => vec![protocol.notice(reply_to, text)],
            Self::AccountIdentify { uid, account } => protocol.set_account(uid, account),
            Self::AccountClear { uid } => protocol.clear_account(uid),
            Self::SetHost { uid, host } => vec![protocol.set_host(uid, host)],
            Self::ChannelMode {
                channel,
                ts,
                change,
                target_uid,
            } => vec![protocol.channel_mode(channel, *ts, change, target_uid)],
            Self::Join { channel, ts } => protocol.join(channel, *ts),
            Self::Part { channel, reason } => vec![protocol.part(channel, reason)],
        }
    }
}

/// Send every effect's lines through `sink`, in order.
pub async fn apply_effects(
    protocol: &dyn Protocol,
    sink: &dyn LineSink,
    reply_to: &str,
    effects: Vec<ServiceEffect>,
) -> Result<(), LinkError> {
    let lines: Vec<String> = effects
        .iter()
        .flat_map(|e| e.to_lines(protocol, reply_to))
        .collect();
    sink.send_lines(lines).await
}
