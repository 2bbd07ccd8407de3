//! Link protocol adapters.
//!
//! Everything that differs between the two supported server protocols
//! lives behind [`Protocol`]: the handshake lines, how the service client
//! is introduced, the wire form of every outbound action, liveness replies,
//! and the rewriting of inbound lines into one canonical vocabulary
//! (InspIRCd-shaped verbs: `UID`, `FJOIN`, `PRIVMSG`, `ENDBURST`, ...), so
//! handlers are written once.

mod insp4;
mod p10;

use std::sync::Arc;

use qserv_proto::Message;

use crate::config::{Config, ProtocolKind};

pub use insp4::Insp4;
pub use p10::P10;

/// Canonical verb for the uplink acknowledging our end of burst (P10 `EA`).
pub const BURST_ACK: &str = "EOBACK";

/// Static description of who we are on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub server_name: String,
    pub server_desc: String,
    pub sid: String,
    pub password: String,
    pub service_uid: String,
    pub service_nick: String,
    pub service_user: String,
    pub service_host: String,
    pub service_realname: String,
}

impl LocalIdentity {
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_name: config.server.name.clone(),
            server_desc: config.server.description.clone(),
            sid: config.server.sid.clone(),
            password: config.uplink.password.clone(),
            service_uid: config.service_uid(),
            service_nick: config.service.nick.clone(),
            service_user: config.service.user.clone(),
            service_host: config.service_host().to_string(),
            service_realname: config.service.realname.clone(),
        }
    }
}

/// What to do with an inbound liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Not a probe addressed to us; dispatch normally.
    NotProbe,
    /// Our own probe echoed back; drop it.
    Ignore,
    /// Answer with this line and drop the probe.
    Reply(String),
}

/// One server-to-server protocol dialect.
pub trait Protocol: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    fn identity(&self) -> &LocalIdentity;

    /// Lines sent immediately after connecting, in order.
    fn handshake(&self, now: i64) -> Vec<String>;

    /// Canonical verb after which the service client gets its annotations
    /// and joins its channels.
    fn setup_trigger(&self) -> &'static str;

    /// Lines answering the uplink's end of burst.
    fn end_of_burst_reply(&self) -> Vec<String> {
        Vec::new()
    }

    /// Standalone service introduction, for dialects that do not introduce
    /// it during the handshake.
    fn introduce_service(&self, _now: i64) -> Vec<String> {
        Vec::new()
    }

    /// WHOIS annotation and service modes for the service client.
    fn service_setup(&self) -> Vec<String>;

    /// Rewrite an inbound line into canonical messages (usually one).
    fn normalize(&self, msg: Message) -> Vec<Message>;

    /// The uplink's server identifier, if `msg` is its introduction.
    fn remote_sid(&self, msg: &Message) -> Option<String>;

    /// Classify a canonical message as a liveness probe.
    fn probe(&self, msg: &Message) -> Probe;

    fn notice(&self, target: &str, text: &str) -> String;

    /// Server-sourced channel mode change on one member (`change` like `+o`).
    fn channel_mode(&self, channel: &str, ts: i64, change: &str, target_uid: &str) -> String;

    /// Service client joins `channel` with operator status.
    fn join(&self, channel: &str, ts: i64) -> Vec<String>;

    fn part(&self, channel: &str, reason: &str) -> String;

    /// Mark `uid` as logged in to `account`.
    fn set_account(&self, uid: &str, account: &str) -> Vec<String>;

    fn clear_account(&self, uid: &str) -> Vec<String>;

    /// Change the displayed host of `uid`.
    fn set_host(&self, uid: &str, host: &str) -> String;
}

/// Build the adapter selected by configuration.
pub fn from_config(config: &Config) -> Arc<dyn Protocol> {
    let identity = LocalIdentity::from_config(config);
    match config.protocol {
        ProtocolKind::Insp4 => Arc::new(Insp4::new(identity)),
        ProtocolKind::P10 => Arc::new(P10::new(identity)),
    }
}

#[cfg(test)]
pub(crate) fn test_identity(kind: ProtocolKind) -> LocalIdentity {
    let (sid, uid) = match kind {
        ProtocolKind::Insp4 => ("042", "042AAAAAA"),
        ProtocolKind::P10 => ("QS", "QSAAA"),
    };
    LocalIdentity {
        server_name: "services.example.org".into(),
        server_desc: "IRC Services".into(),
        sid: sid.into(),
        password: "linkpass".into(),
        service_uid: uid.into(),
        service_nick: "Q".into(),
        service_user: "qserv".into(),
        service_host: "services.example.org".into(),
        service_realname: "Channel Service".into(),
    }
}
