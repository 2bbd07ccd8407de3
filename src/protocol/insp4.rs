//! InspIRCd 4 spanning-tree protocol (CAPAB 1206).
//!
//! The canonical vocabulary is this dialect, so inbound lines pass
//! through unchanged.

use qserv_proto::Message;

use super::{LocalIdentity, Probe, Protocol};
use crate::config::ProtocolKind;

/// Service client modes: bot, service.
const SERVICE_MODES: &str = "+Bk";
const SERVICE_SWHOIS: &str = "is a Network Service";

pub struct Insp4 {
    id: LocalIdentity,
}

impl Insp4 {
    pub fn new(id: LocalIdentity) -> Self {
        Self { id }
    }

    fn is_own_sid(&self, s: &str) -> bool {
        s.eq_ignore_ascii_case(&self.id.sid)
    }
}

impl Protocol for Insp4 {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Insp4
    }

    fn identity(&self) -> &LocalIdentity {
        &self.id
    }

    fn handshake(&self, now: i64) -> Vec<String> {
        let id = &self.id;
        vec![
            "CAPAB START 1206".to_string(),
            "CAPAB END".to_string(),
            format!(
                "SERVER {} {} {} :{}",
                id.server_name, id.password, id.sid, id.server_desc
            ),
            format!(":{} BURST {}", id.sid, now),
            // :<sid> UID <uid> <ts> <nick> <real-host> <displayed-host>
            //   <real-user> <displayed-user> <ip> <signon> <modes> :<real>
            format!(
                ":{sid} UID {uid} {now} {nick} {host} {host} {user} {user} 0.0.0.0 {now} {modes} :{real}",
                sid = id.sid,
                uid = id.service_uid,
                nick = id.service_nick,
                host = id.service_host,
                user = id.service_user,
                modes = SERVICE_MODES,
                real = id.service_realname,
            ),
            format!(":{} ENDBURST", id.sid),
        ]
    }

    fn setup_trigger(&self) -> &'static str {
        "ENDBURST"
    }

    fn service_setup(&self) -> Vec<String> {
        let id = &self.id;
        vec![
            format!(
                ":{} METADATA {} swhois :{}",
                id.sid, id.service_uid, SERVICE_SWHOIS
            ),
            format!(":{} MODE {} {}", id.sid, id.service_uid, SERVICE_MODES),
        ]
    }

    fn normalize(&self, msg: Message) -> Vec<Message> {
        vec![msg]
    }

    fn remote_sid(&self, msg: &Message) -> Option<String> {
        // SERVER <name> <password> <sid> :<description>
        if msg.source.is_none() && msg.verb.eq_ignore_ascii_case("SERVER") {
            return msg.param(2).map(str::to_string);
        }
        None
    }

    fn probe(&self, msg: &Message) -> Probe {
        if !msg.verb.eq_ignore_ascii_case("PING") {
            return Probe::NotProbe;
        }
        if msg.source.as_deref().is_some_and(|s| self.is_own_sid(s)) {
            return Probe::Ignore;
        }

        // Peer form: ":<src> PING <dst>" or "PING <src> <dst>".
        let pair = match (msg.source.as_deref(), msg.params.as_slice()) {
            (Some(src), [dst, ..]) => Some((src, dst.as_str())),
            (Some(src), []) => msg.trailing.as_deref().map(|dst| (src, dst)),
            (None, [src, dst, ..]) => Some((src.as_str(), dst.as_str())),
            _ => None,
        };

        match pair {
            Some((src, _)) if self.is_own_sid(src) => Probe::Ignore,
            Some((src, dst)) if self.is_own_sid(dst) => {
                Probe::Reply(format!("PONG {} {}", src, self.id.sid))
            }
            Some(_) => Probe::NotProbe,
            // Token form: "PING <token>" / "PING :<token>".
            None => match (&msg.trailing, msg.param(0)) {
                (Some(tok), _) => Probe::Reply(format!("PONG :{tok}")),
                (None, Some(tok)) => Probe::Reply(format!("PONG {tok}")),
                (None, None) => Probe::Reply("PONG :qserv".to_string()),
            },
        }
    }

    fn notice(&self, target: &str, text: &str) -> String {
        format!(":{} NOTICE {} :{}", self.id.service_uid, target, text)
    }

    fn channel_mode(&self, channel: &str, ts: i64, change: &str, target_uid: &str) -> String {
        format!(
            ":{} FMODE {} {} {} {}",
            self.id.sid, channel, ts, change, target_uid
        )
    }

    fn join(&self, channel: &str, ts: i64) -> Vec<String> {
        // A server-sourced FJOIN with the channel's own TS keeps the op prefix.
        vec![format!(
            ":{} FJOIN {} {} + :o,{}",
            self.id.sid, channel, ts, self.id.service_uid
        )]
    }

    fn part(&self, channel: &str, reason: &str) -> String {
        format!(":{} PART {} :{}", self.id.service_uid, channel, reason)
    }

    fn set_account(&self, uid: &str, account: &str) -> Vec<String> {
        vec![
            format!(":{} METADATA {} accountname :{}", self.id.sid, uid, account),
            format!(":{} MODE {} +r", self.id.sid, uid),
        ]
    }

    fn clear_account(&self, uid: &str) -> Vec<String> {
        vec![
            format!(":{} MODE {} -r", self.id.sid, uid),
            format!(":{} METADATA {} accountname :", self.id.sid, uid),
        ]
    }

    fn set_host(&self, uid: &str, host: &str) -> String {
        format!(":{} CHGHOST {} {}", self.id.sid, uid, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_identity;

    fn proto() -> Insp4 {
        Insp4::new(test_identity(ProtocolKind::Insp4))
    }

    fn msg(line: &str) -> Message {
        Message::parse(line).unwrap()
    }

    #[test]
    fn service_uid_is_introduced_inside_our_burst() {
        let lines = proto().handshake(1_700_000_000);
        let burst = lines.iter().position(|l| l.contains(" BURST ")).unwrap();
        let uid = lines.iter().position(|l| l.contains(" UID 042AAAAAA ")).unwrap();
        let end = lines.iter().position(|l| l.ends_with(" ENDBURST")).unwrap();
        assert!(burst < uid && uid < end);
        assert_eq!(lines[0], "CAPAB START 1206");
        assert_eq!(
            lines[2],
            "SERVER services.example.org linkpass 042 :IRC Services"
        );
        assert_eq!(
            lines[uid],
            ":042 UID 042AAAAAA 1700000000 Q services.example.org services.example.org qserv qserv 0.0.0.0 1700000000 +Bk :Channel Service"
        );
    }

    #[test]
    fn peer_probe_addressed_to_us_is_answered() {
        let p = proto();
        assert_eq!(
            p.probe(&msg(":034 PING 042")),
            Probe::Reply("PONG 034 042".into())
        );
        assert_eq!(
            p.probe(&msg("PING 034 042")),
            Probe::Reply("PONG 034 042".into())
        );
    }

    #[test]
    fn own_probe_echo_is_ignored() {
        let p = proto();
        assert_eq!(p.probe(&msg(":042 PING 034")), Probe::Ignore);
        assert_eq!(p.probe(&msg("PING 042 034")), Probe::Ignore);
        assert_eq!(p.probe(&msg(":042 PING")), Probe::Ignore);
        assert_eq!(p.probe(&msg(":042 PING :token")), Probe::Ignore);
    }

    #[test]
    fn probe_for_another_server_is_not_ours() {
        assert_eq!(proto().probe(&msg(":034 PING 099")), Probe::NotProbe);
        assert_eq!(proto().probe(&msg(":034 PRIVMSG 042AAAAAA :hi")), Probe::NotProbe);
    }

    #[test]
    fn token_probe_echoes_token() {
        let p = proto();
        assert_eq!(p.probe(&msg("PING :abc")), Probe::Reply("PONG :abc".into()));
        assert_eq!(p.probe(&msg("PING abc")), Probe::Reply("PONG abc".into()));
    }

    #[test]
    fn remote_sid_from_server_line() {
        let p = proto();
        assert_eq!(
            p.remote_sid(&msg("SERVER hub.example.org linkpass 034 :Hub")),
            Some("034".into())
        );
        assert_eq!(p.remote_sid(&msg(":034 SERVER leaf.example.org 035 :Leaf")), None);
    }

    #[test]
    fn action_lines() {
        let p = proto();
        assert_eq!(
            p.channel_mode("#test", 1_700_000_000, "+o", "034AAAAAB"),
            ":042 FMODE #test 1700000000 +o 034AAAAAB"
        );
        assert_eq!(
            p.set_account("034AAAAAB", "bob"),
            vec![
                ":042 METADATA 034AAAAAB accountname :bob",
                ":042 MODE 034AAAAAB +r"
            ]
        );
        assert_eq!(
            p.set_host("034AAAAAB", "bob.users.example.org"),
            ":042 CHGHOST 034AAAAAB bob.users.example.org"
        );
        assert_eq!(
            p.join("#feds", 1_600_000_000),
            vec![":042 FJOIN #feds 1600000000 + :o,042AAAAAA"]
        );
        assert_eq!(p.notice("034AAAAAB", "pong"), ":042AAAAAA NOTICE 034AAAAAB :pong");
    }
}
