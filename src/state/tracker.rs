//! Bus handler that feeds [`NetworkState`] from protocol events.
//!
//! Messages arrive in the canonical (InspIRCd-shaped) vocabulary; the P10
//! adapter rewrites its tokens before dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use qserv_proto::{ChannelExt, Message};
use tracing::{debug, trace};

use super::NetworkState;
use crate::bus::Handler;
use crate::error::HandlerError;

/// Verbs the tracker consumes.
pub const TRACKED_VERBS: &[&str] = &[
    "UID", "NICK", "FJOIN", "IJOIN", "JOIN", "PART", "KICK", "QUIT", "KILL", "OPERTYPE", "MODE",
];

/// State-tracking handler.
pub struct Tracker {
    state: Arc<NetworkState>,
}

impl Tracker {
    pub fn new(state: Arc<NetworkState>) -> Self {
        Self { state }
    }

    fn source<'a>(msg: &'a Message, verb: &'static str) -> Result<&'a str, HandlerError> {
        msg.source
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(HandlerError::NeedMoreParams(verb))
    }

    fn param<'a>(msg: &'a Message, idx: usize, verb: &'static str) -> Result<&'a str, HandlerError> {
        msg.param(idx).ok_or(HandlerError::NeedMoreParams(verb))
    }

    fn ts_param(msg: &Message, idx: usize) -> i64 {
        msg.param(idx)
            .and_then(|t| t.parse::<i64>().ok())
            .unwrap_or(0)
    }
}

/// Identities from a channel-burst member list.
///
/// Entries look like `<prefixes>,<uid>[:<membid>]`; prefixes may be empty.
fn burst_members(list: &str) -> impl Iterator<Item = &str> {
    list.split_whitespace().filter_map(|entry| {
        let uid = entry.split_once(',').map_or(entry, |(_, rest)| rest);
        let uid = uid.split_once(':').map_or(uid, |(uid, _)| uid);
        (!uid.is_empty()).then_some(uid)
    })
}

/// Last `o` change in a user mode string: `Some(true)` for `+o`.
fn oper_change(modes: &str) -> Option<bool> {
    let mut adding = true;
    let mut result = None;
    for c in modes.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            'o' => result = Some(adding),
            _ => {}
        }
    }
    result
}

#[async_trait]
impl Handler for Tracker {
    fn name(&self) -> &'static str {
        "tracker"
    }

    async fn handle(&self, msg: &Message) -> Result<(), HandlerError> {
        let state = &self.state;
        match msg.verb_upper().as_str() {
            // :<sid> UID <uid> <ts> <nick> ...
            "UID" => {
                let uid = Self::param(msg, 0, "UID")?;
                let nick = Self::param(msg, 2, "UID")?;
                state.set_nick(uid, nick);
                trace!(uid, nick, "Identity introduced");
            }
            // :<uid> NICK <newnick> [<ts>]
            "NICK" => {
                let uid = Self::source(msg, "NICK")?;
                let nick = Self::param(msg, 0, "NICK")?;
                state.set_nick(uid, nick);
            }
            // :<sid> FJOIN <chan> <ts> <modes> [args] :<members>
            "FJOIN" => {
                let channel = Self::param(msg, 0, "FJOIN")?;
                let ts = Self::ts_param(msg, 1);
                let members = msg.trailing.as_deref().unwrap_or_default();
                state.add_members(channel, ts, burst_members(members));
                debug!(channel, ts, "Channel burst");
            }
            // :<uid> IJOIN <chan> <membid> [<ts> <modes>]
            "IJOIN" => {
                let uid = Self::source(msg, "IJOIN")?;
                let channel = Self::param(msg, 0, "IJOIN")?;
                state.add_members(channel, Self::ts_param(msg, 2), [uid]);
            }
            // :<uid> JOIN <chan>[,<chan>...] [<ts>]
            "JOIN" => {
                let uid = Self::source(msg, "JOIN")?;
                let channels = Self::param(msg, 0, "JOIN")?;
                if channels == "0" {
                    state.part_all(uid);
                    return Ok(());
                }
                let ts = Self::ts_param(msg, 1);
                for channel in channels.split(',').filter(|c| !c.is_empty()) {
                    state.add_members(channel, ts, [uid]);
                }
            }
            // :<uid> PART <chan>[,<chan>...] [:reason]
            "PART" => {
                let uid = Self::source(msg, "PART")?;
                let channels = Self::param(msg, 0, "PART")?;
                for channel in channels.split(',') {
                    state.remove_member(channel, uid);
                }
            }
            // :<src> KICK <chan> <uid> [:reason]
            "KICK" => {
                let channel = Self::param(msg, 0, "KICK")?;
                let uid = Self::param(msg, 1, "KICK")?;
                state.remove_member(channel, uid);
            }
            // :<uid> QUIT [:reason]
            "QUIT" => {
                let uid = Self::source(msg, "QUIT")?;
                state.remove_identity(uid);
                trace!(uid, "Identity quit");
            }
            // :<src> KILL <uid> [:reason]
            "KILL" => {
                let uid = Self::param(msg, 0, "KILL")?;
                state.remove_identity(uid);
            }
            // :<uid> OPERTYPE :<type>
            "OPERTYPE" => {
                let uid = Self::source(msg, "OPERTYPE")?;
                state.add_oper(uid);
                debug!(uid, "Operator status granted");
            }
            // :<src> MODE <target> <modes> ...; only user +o/-o matters here.
            "MODE" => {
                let target = Self::param(msg, 0, "MODE")?;
                if target.is_channel_name() {
                    return Ok(());
                }
                let Some(uid) = state
                    .nick_of(target)
                    .map(|_| target.to_string())
                    .or_else(|| state.uid_of(target))
                else {
                    return Ok(());
                };
                match oper_change(msg.param(1).or(msg.trailing.as_deref()).unwrap_or_default()) {
                    Some(true) => state.add_oper(&uid),
                    Some(false) => {
                        state.remove_oper(&uid);
                        debug!(uid = %uid, "Operator status removed");
                    }
                    None => {}
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn feed(tracker: &Tracker, line: &str) {
        tracker.handle(&Message::parse(line).unwrap()).await.unwrap();
    }

    #[test]
    fn parses_burst_member_entries() {
        let uids: Vec<_> = burst_members("o,034AAAAAB:1 ,034AAAAAC:7 v,034AAAAAD ,").collect();
        assert_eq!(uids, vec!["034AAAAAB", "034AAAAAC", "034AAAAAD"]);
    }

    #[tokio::test]
    async fn tracks_burst_join_part_and_quit() {
        let state = Arc::new(NetworkState::new());
        let tracker = Tracker::new(Arc::clone(&state));

        feed(&tracker, ":034 UID 034AAAAAB 1700000000 alice h h alice alice 10.0.0.1 1700000000 +i :Alice").await;
        feed(&tracker, ":034 UID 034AAAAAC 1700000000 bob h h bob bob 10.0.0.2 1700000000 +i :Bob").await;
        feed(&tracker, ":034 FJOIN #test 1690000000 +nt :o,034AAAAAB:1").await;
        feed(&tracker, ":034AAAAAC IJOIN #test 4").await;
        assert!(state.is_member("#test", "034AAAAAB"));
        assert!(state.is_member("#TEST", "034AAAAAC"));
        assert_eq!(state.channel_ts("#test"), Some(1_690_000_000));

        // A later burst must not move the TS.
        feed(&tracker, ":034 FJOIN #test 1800000000 + :,034AAAAAC:5").await;
        assert_eq!(state.channel_ts("#test"), Some(1_690_000_000));

        feed(&tracker, ":034AAAAAC PART #test :bye").await;
        assert!(!state.is_member("#test", "034AAAAAC"));

        feed(&tracker, ":034AAAAAB NICK alicia 1700000100").await;
        assert_eq!(state.uid_of("alicia").as_deref(), Some("034AAAAAB"));

        feed(&tracker, ":034AAAAAB OPERTYPE :NetAdmin").await;
        assert!(state.is_oper("034AAAAAB"));

        feed(&tracker, ":034AAAAAB QUIT :gone").await;
        assert!(state.uid_of("alicia").is_none());
        assert!(!state.is_member("#test", "034AAAAAB"));
        assert!(!state.is_oper("034AAAAAB"));
    }

    #[tokio::test]
    async fn join_zero_parts_everything() {
        let state = Arc::new(NetworkState::new());
        let tracker = Tracker::new(Arc::clone(&state));
        feed(&tracker, ":u1 JOIN #a,#b 1700000000").await;
        assert!(state.is_member("#b", "u1"));
        feed(&tracker, ":u1 JOIN 0").await;
        assert!(!state.is_member("#a", "u1"));
        assert!(!state.is_member("#b", "u1"));
    }

    #[tokio::test]
    async fn kill_and_kick_remove() {
        let state = Arc::new(NetworkState::new());
        let tracker = Tracker::new(Arc::clone(&state));
        feed(&tracker, ":034 UID u1 1 n h h u u 0.0.0.0 1 + :r").await;
        feed(&tracker, ":u1 JOIN #a").await;
        feed(&tracker, ":u2 KICK #a u1 :out").await;
        assert!(!state.is_member("#a", "u1"));
        feed(&tracker, ":034 KILL u1 :dead").await;
        assert!(state.nick_of("u1").is_none());
    }

    #[tokio::test]
    async fn user_mode_toggles_oper() {
        let state = Arc::new(NetworkState::new());
        let tracker = Tracker::new(Arc::clone(&state));
        feed(&tracker, ":034 UID u1 1 carol h h u u 0.0.0.0 1 + :r").await;
        feed(&tracker, ":u1 MODE carol +io").await;
        assert!(state.is_oper("u1"));
        feed(&tracker, ":u1 MODE u1 -o").await;
        assert!(!state.is_oper("u1"));
        feed(&tracker, ":034 MODE #chan +o u1").await;
        assert!(!state.is_oper("u1"));
    }

    #[test]
    fn oper_change_takes_last_o() {
        assert_eq!(oper_change("+iow"), Some(true));
        assert_eq!(oper_change("-o+i"), Some(false));
        assert_eq!(oper_change("+o-o"), Some(false));
        assert_eq!(oper_change("+iw"), None);
    }

    #[tokio::test]
    async fn missing_params_are_reported() {
        let state = Arc::new(NetworkState::new());
        let tracker = Tracker::new(state);
        let err = tracker
            .handle(&Message::parse(":034 UID 034AAAAAB").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NeedMoreParams("UID")));
    }
}
