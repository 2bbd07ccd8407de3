//! P10 (ircu / Nefarious).
//!
//! After the handshake every P10 line starts with the sender's numeric
//! without a colon and uses one- or two-letter tokens. [`P10::normalize`]
//! moves the numeric into the source and maps tokens onto the canonical
//! verbs.

use qserv_proto::{ChannelExt, Message};

use super::{BURST_ACK, LocalIdentity, Probe, Protocol};
use crate::config::ProtocolKind;

/// Numeric alphabet used by server and client numerics.
const NUMERIC_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789[]";
/// Service client modes: oper, deaf, channel service.
const SERVICE_MODES: &str = "+odk";
const SERVICE_SWHOIS: &str = "is a Network Service";

pub struct P10 {
    id: LocalIdentity,
}

impl P10 {
    pub fn new(id: LocalIdentity) -> Self {
        Self { id }
    }

    fn is_numeric(token: &str) -> bool {
        matches!(token.len(), 2 | 5)
            && !matches!(token, "ERROR" | "SQUIT")
            && token.chars().all(|c| NUMERIC_ALPHABET.contains(c))
    }

    /// Canonical verb for a P10 token.
    fn canonical_verb(token: &str) -> Option<&'static str> {
        Some(match token {
            "B" => "FJOIN",
            "C" | "J" => "JOIN",
            "L" => "PART",
            "K" => "KICK",
            "Q" => "QUIT",
            "D" => "KILL",
            "P" => "PRIVMSG",
            "O" => "NOTICE",
            "M" => "MODE",
            "G" => "PING",
            "Z" => "PONG",
            "EB" => "ENDBURST",
            "EA" => BURST_ACK,
            "S" => "SERVER",
            "SQ" => "SQUIT",
            "AC" => "ACCOUNT",
            "Y" => "ERROR",
            _ => return None,
        })
    }

    /// `N` from a server: a new client.
    ///
    /// `<server> N <nick> <hop> <ts> <user> <host> [+modes [args]] <b64ip> <numeric> :<real>`
    fn new_client(source: String, params: Vec<String>, trailing: Option<String>) -> Vec<Message> {
        let n = params.len();
        if n < 7 {
            return Vec::new();
        }
        let (nick, ts, user, host) = (&params[0], &params[2], &params[3], &params[4]);
        let numeric = params[n - 1].clone();
        let ip = params[n - 2].clone();
        let modes = params
            .get(5)
            .filter(|m| m.starts_with('+') && n > 7)
            .cloned()
            .unwrap_or_else(|| "+".to_string());

        let mut out = vec![
            Message::new(
                "UID",
                [
                    numeric.clone(),
                    ts.clone(),
                    nick.clone(),
                    host.clone(),
                    host.clone(),
                    user.clone(),
                    user.clone(),
                    ip,
                    ts.clone(),
                    modes.clone(),
                ],
            )
            .with_source(source)
            .with_trailing(trailing.unwrap_or_default()),
        ];
        if modes.contains('o') {
            out.push(
                Message::new("OPERTYPE", Vec::<String>::new())
                    .with_source(numeric)
                    .with_trailing("Oper"),
            );
        }
        out
    }

    /// `B`: channel burst.
    ///
    /// `<server> B <chan> <ts> [+modes [args]] [<members>] [:%<bans>]`
    /// with members as `<numeric>[:<modes>]` separated by commas. A member
    /// without modes inherits the modes of the previous entry.
    fn burst(source: String, params: Vec<String>) -> Vec<Message> {
        if params.len() < 2 {
            return Vec::new();
        }
        let mut idx = 2;
        if let Some(modes) = params.get(idx).filter(|m| m.starts_with('+')) {
            let args = modes.chars().filter(|c| matches!(c, 'k' | 'l')).count();
            idx += 1 + args;
        }

        let mut members = Vec::new();
        if let Some(list) = params.get(idx) {
            let mut current = String::new();
            for entry in list.split(',').filter(|e| !e.is_empty()) {
                let (numeric, modes) = entry.split_once(':').unwrap_or((entry, ""));
                if !modes.is_empty() {
                    current = modes.chars().filter(|c| matches!(c, 'o' | 'v' | 'h')).collect();
                }
                members.push(format!("{current},{numeric}"));
            }
        }

        vec![
            Message::new("FJOIN", [params[0].clone(), params[1].clone(), "+".to_string()])
                .with_source(source)
                .with_trailing(members.join(" ")),
        ]
    }
}

impl Protocol for P10 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::P10
    }

    fn identity(&self) -> &LocalIdentity {
        &self.id
    }

    fn handshake(&self, now: i64) -> Vec<String> {
        let id = &self.id;
        vec![
            format!("PASS :{}", id.password),
            // SERVER <name> <hop> <start> <link> J10 <numeric><maxconn> +<flags> :<desc>
            format!(
                "SERVER {} 1 {} {} J10 {}]]] +s6 :{}",
                id.server_name, now, now, id.sid, id.server_desc
            ),
            format!("{} EB", id.sid),
        ]
    }

    fn setup_trigger(&self) -> &'static str {
        BURST_ACK
    }

    fn end_of_burst_reply(&self) -> Vec<String> {
        vec![format!("{} EA", self.id.sid)]
    }

    fn introduce_service(&self, now: i64) -> Vec<String> {
        let id = &self.id;
        vec![format!(
            "{sid} N {nick} 1 {now} {user} {host} {modes} AAAAAA {uid} :{real}",
            sid = id.sid,
            nick = id.service_nick,
            user = id.service_user,
            host = id.service_host,
            modes = SERVICE_MODES,
            uid = id.service_uid,
            real = id.service_realname,
        )]
    }

    fn service_setup(&self) -> Vec<String> {
        vec![format!(
            "{} SW {} :{}",
            self.id.sid, self.id.service_uid, SERVICE_SWHOIS
        )]
    }

    fn normalize(&self, msg: Message) -> Vec<Message> {
        if msg.source.is_some() || !Self::is_numeric(&msg.verb) || msg.params.is_empty() {
            return vec![msg];
        }

        let Message {
            tags,
            verb: source,
            mut params,
            trailing,
            raw,
            ..
        } = msg;
        let token = params.remove(0);

        let mut out = match token.as_str() {
            "N" if source.len() == 2 => Self::new_client(source, params, trailing),
            // <client> N <newnick> <ts>
            "N" => vec![Message::new("NICK", params).with_source(source)],
            "B" => Self::burst(source, params),
            _ => {
                let verb = Self::canonical_verb(&token).unwrap_or(token.as_str()).to_string();
                if matches!(verb.as_str(), "PRIVMSG" | "NOTICE")
                    && let Some(target) = params.first_mut()
                {
                    *target = bare_target(target).to_string();
                }
                vec![Message {
                    tags: None,
                    source: Some(source),
                    verb,
                    params,
                    trailing,
                    raw: String::new(),
                }]
            }
        };
        for m in &mut out {
            m.tags = tags.clone();
            m.raw = raw.clone();
        }
        out
    }

    fn remote_sid(&self, msg: &Message) -> Option<String> {
        // SERVER <name> <hop> <start> <link> <proto> <numeric><maxconn> <flags> :<desc>
        if msg.source.is_none() && msg.verb.eq_ignore_ascii_case("SERVER") {
            return msg
                .param(5)
                .and_then(|n| n.get(..2))
                .map(str::to_string);
        }
        None
    }

    fn probe(&self, msg: &Message) -> Probe {
        if !msg.verb.eq_ignore_ascii_case("PING") {
            return Probe::NotProbe;
        }
        if msg
            .source
            .as_deref()
            .is_some_and(|s| s == self.id.sid)
        {
            return Probe::Ignore;
        }
        let token = msg
            .param(0)
            .or(msg.trailing.as_deref())
            .unwrap_or(&self.id.server_name);
        Probe::Reply(format!("{sid} Z {sid} :{token}", sid = self.id.sid))
    }

    fn notice(&self, target: &str, text: &str) -> String {
        format!("{} O {} :{}", self.id.service_uid, target, text)
    }

    fn channel_mode(&self, channel: &str, ts: i64, change: &str, target_uid: &str) -> String {
        format!("{} M {} {} {} {}", self.id.sid, channel, change, target_uid, ts)
    }

    fn join(&self, channel: &str, ts: i64) -> Vec<String> {
        vec![
            format!("{} J {} {}", self.id.service_uid, channel, ts),
            self.channel_mode(channel, ts, "+o", &self.id.service_uid),
        ]
    }

    fn part(&self, channel: &str, reason: &str) -> String {
        format!("{} L {} :{}", self.id.service_uid, channel, reason)
    }

    fn set_account(&self, uid: &str, account: &str) -> Vec<String> {
        vec![format!("{} AC {} R {}", self.id.sid, uid, account)]
    }

    fn clear_account(&self, uid: &str) -> Vec<String> {
        vec![format!("{} AC {} U", self.id.sid, uid)]
    }

    fn set_host(&self, uid: &str, host: &str) -> String {
        format!("{} FA {} {}", self.id.sid, uid, host)
    }
}

/// Strip a `nick@server` target down to its nick, leaving channels alone.
pub fn bare_target(target: &str) -> &str {
    if target.is_channel_name() {
        return target;
    }
    target.split_once('@').map_or(target, |(nick, _)| nick)
}
