//! Network-state tracking.
//!
//! [`NetworkState`] holds what the link has told us about the network:
//! the identity ↔ nick map, per-channel timestamp and membership, operator
//! status, and the ephemeral session bindings from identity to account.
//! Each table has its own lock, so events arriving out of order only ever
//! contend on the table they touch.

mod tracker;

use std::collections::{HashMap, HashSet};

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use qserv_proto::irc_to_lower;

pub use tracker::{TRACKED_VERBS, Tracker};

/// Timestamps above this are treated as milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Normalise a protocol timestamp: milliseconds become seconds, negatives
/// become 0 (unknown).
pub fn normalize_ts(ts: i64) -> i64 {
    if ts > MILLIS_THRESHOLD {
        ts / 1000
    } else {
        ts.max(0)
    }
}

/// Live state of one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Name as first seen.
    pub name: String,
    /// Channel TS; 0 until an authoritative source provides one.
    pub ts: i64,
    /// Identities currently present.
    pub members: HashSet<String>,
}

#[derive(Debug, Default)]
struct Identities {
    nick_by_uid: HashMap<String, String>,
    /// Keyed by folded nick.
    uid_by_nick: HashMap<String, String>,
}

/// Live network state for the current link.
#[derive(Debug, Default)]
pub struct NetworkState {
    identities: RwLock<Identities>,
    channels: DashMap<String, ChannelState>,
    opers: DashSet<String>,
    sessions: DashMap<String, String>,
}

impl NetworkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the network. Called when a new link is established; the
    /// uplink bursts the network again.
    ///
    /// Session bindings survive: their users are usually still connected.
    /// Bindings whose identity is not re-introduced are dropped by
    /// [`NetworkState::prune_sessions`] once the burst is over.
    pub fn reset(&self) {
        *self.identities.write() = Identities::default();
        self.channels.clear();
        self.opers.clear();
    }

    // ------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------

    /// Record a new identity, or a nick change for a known one.
    pub fn set_nick(&self, uid: &str, nick: &str) {
        let mut ids = self.identities.write();
        if let Some(old) = ids.nick_by_uid.insert(uid.to_string(), nick.to_string()) {
            let old_key = irc_to_lower(&old);
            if ids.uid_by_nick.get(&old_key).is_some_and(|u| u == uid) {
                ids.uid_by_nick.remove(&old_key);
            }
        }
        ids.uid_by_nick.insert(irc_to_lower(nick), uid.to_string());
    }

    pub fn nick_of(&self, uid: &str) -> Option<String> {
        self.identities.read().nick_by_uid.get(uid).cloned()
    }

    pub fn uid_of(&self, nick: &str) -> Option<String> {
        self.identities
            .read()
            .uid_by_nick
            .get(&irc_to_lower(nick))
            .cloned()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.read().nick_by_uid.len()
    }

    /// Remove an identity everywhere: nick map, every channel, operator
    /// set and session binding.
    pub fn remove_identity(&self, uid: &str) {
        {
            let mut ids = self.identities.write();
            if let Some(nick) = ids.nick_by_uid.remove(uid) {
                let key = irc_to_lower(&nick);
                if ids.uid_by_nick.get(&key).is_some_and(|u| u == uid) {
                    ids.uid_by_nick.remove(&key);
                }
            }
        }
        for mut chan in self.channels.iter_mut() {
            chan.members.remove(uid);
        }
        self.opers.remove(uid);
        self.sessions.remove(uid);
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Add `uids` to `channel`, creating it if needed, and record `ts` if
    /// the channel has none yet.
    pub fn add_members<I, S>(&self, channel: &str, ts: i64, uids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entry = self
            .channels
            .entry(irc_to_lower(channel))
            .or_insert_with(|| ChannelState {
                name: channel.to_string(),
                ..ChannelState::default()
            });
        let ts = normalize_ts(ts);
        if entry.ts == 0 && ts > 0 {
            entry.ts = ts;
        }
        entry.members.extend(uids.into_iter().map(Into::into));
    }

    /// Record a TS for `channel` unless one is already known. Returns the
    /// TS now in effect (0 if still unknown).
    pub fn record_ts(&self, channel: &str, ts: i64) -> i64 {
        self.add_members(channel, ts, std::iter::empty::<String>());
        self.channel_ts(channel).unwrap_or(0)
    }

    pub fn remove_member(&self, channel: &str, uid: &str) {
        if let Some(mut chan) = self.channels.get_mut(&irc_to_lower(channel)) {
            chan.members.remove(uid);
        }
    }

    /// Remove `uid` from every channel.
    pub fn part_all(&self, uid: &str) {
        for mut chan in self.channels.iter_mut() {
            chan.members.remove(uid);
        }
    }

    /// Known non-zero TS of `channel`.
    pub fn channel_ts(&self, channel: &str) -> Option<i64> {
        self.channels
            .get(&irc_to_lower(channel))
            .map(|c| c.ts)
            .filter(|ts| *ts > 0)
    }

    pub fn is_member(&self, channel: &str, uid: &str) -> bool {
        self.channels
            .get(&irc_to_lower(channel))
            .is_some_and(|c| c.members.contains(uid))
    }

    pub fn channel(&self, channel: &str) -> Option<ChannelState> {
        self.channels
            .get(&irc_to_lower(channel))
            .map(|c| c.value().clone())
    }

    /// Discard cached state for `channel`.
    pub fn drop_channel(&self, channel: &str) -> bool {
        self.channels.remove(&irc_to_lower(channel)).is_some()
    }

    /// Resolve a nick to an identity present in `channel`.
    pub fn member_by_nick(&self, channel: &str, nick: &str) -> Option<String> {
        self.uid_of(nick).filter(|uid| self.is_member(channel, uid))
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    pub fn add_oper(&self, uid: &str) {
        self.opers.insert(uid.to_string());
    }

    pub fn remove_oper(&self, uid: &str) {
        self.opers.remove(uid);
    }

    pub fn is_oper(&self, uid: &str) -> bool {
        self.opers.contains(uid)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Bind `uid` to `account` for the life of its connection.
    pub fn bind_session(&self, uid: &str, account: &str) {
        self.sessions.insert(uid.to_string(), account.to_string());
    }

    /// Release a binding, returning the account it held.
    pub fn unbind_session(&self, uid: &str) -> Option<String> {
        self.sessions.remove(uid).map(|(_, acct)| acct)
    }

    pub fn session_account(&self, uid: &str) -> Option<String> {
        self.sessions.get(uid).map(|a| a.value().clone())
    }

    /// Drop bindings for identities the network no longer knows. Returns
    /// how many were dropped.
    pub fn prune_sessions(&self) -> usize {
        let ids = self.identities.read();
        let before = self.sessions.len();
        self.sessions
            .retain(|uid, _| ids.nick_by_uid.contains_key(uid));
        before - self.sessions.len()
    }

    /// Account bound to whoever currently uses `nick`.
    pub fn session_account_by_nick(&self, nick: &str) -> Option<String> {
        self.uid_of(nick).and_then(|uid| self.session_account(&uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_changes_keep_the_map_bidirectional() {
        let state = NetworkState::new();
        state.set_nick("042AAAAAB", "Alice");
        assert_eq!(state.uid_of("alice").as_deref(), Some("042AAAAAB"));

        state.set_nick("042AAAAAB", "Alicia");
        assert!(state.uid_of("alice").is_none());
        assert_eq!(state.uid_of("ALICIA").as_deref(), Some("042AAAAAB"));
        assert_eq!(state.nick_of("042AAAAAB").as_deref(), Some("Alicia"));
    }

    #[test]
    fn ts_is_set_once() {
        let state = NetworkState::new();
        state.add_members("#Test", 0, ["a"]);
        assert_eq!(state.channel_ts("#test"), None);

        state.add_members("#test", 1_700_000_000, ["b"]);
        state.add_members("#test", 1_600_000_000, ["c"]);
        assert_eq!(state.channel_ts("#TEST"), Some(1_700_000_000));
        assert_eq!(state.channel("#test").unwrap().members.len(), 3);
        assert_eq!(state.channel("#test").unwrap().name, "#Test");
    }

    #[test]
    fn millisecond_ts_is_normalised() {
        let state = NetworkState::new();
        assert_eq!(state.record_ts("#m", 1_700_000_000_123), 1_700_000_000);
        assert_eq!(normalize_ts(-5), 0);
    }

    #[test]
    fn removing_identity_clears_everything() {
        let state = NetworkState::new();
        state.set_nick("u1", "bob");
        state.add_members("#a", 1, ["u1"]);
        state.add_members("#b", 1, ["u1", "u2"]);
        state.add_oper("u1");
        state.bind_session("u1", "bob");

        state.remove_identity("u1");
        assert!(state.uid_of("bob").is_none());
        assert!(!state.is_member("#a", "u1"));
        assert!(!state.is_member("#b", "u1"));
        assert!(state.is_member("#b", "u2"));
        assert!(!state.is_oper("u1"));
        assert!(state.session_account("u1").is_none());
    }

    #[test]
    fn member_by_nick_requires_presence() {
        let state = NetworkState::new();
        state.set_nick("u1", "Bob");
        state.add_members("#a", 1, ["u1"]);
        assert_eq!(state.member_by_nick("#A", "bob").as_deref(), Some("u1"));
        assert!(state.member_by_nick("#other", "bob").is_none());
    }

    #[test]
    fn sessions_bind_and_release() {
        let state = NetworkState::new();
        state.set_nick("u1", "al");
        state.bind_session("u1", "alice");
        assert_eq!(state.session_account_by_nick("AL").as_deref(), Some("alice"));
        assert_eq!(state.unbind_session("u1").as_deref(), Some("alice"));
        assert!(state.session_account("u1").is_none());
    }

    #[test]
    fn reset_forgets_the_network_but_not_logins() {
        let state = NetworkState::new();
        state.set_nick("u1", "x");
        state.set_nick("u2", "y");
        state.add_members("#a", 5, ["u1"]);
        state.add_oper("u1");
        state.bind_session("u1", "x");
        state.bind_session("u2", "y");
        state.reset();
        assert_eq!(state.identity_count(), 0);
        assert!(state.channel("#a").is_none());
        assert!(!state.is_oper("u1"));
        assert_eq!(state.session_account("u1").as_deref(), Some("x"));

        // Only u1 comes back in the new burst.
        state.set_nick("u1", "x");
        assert_eq!(state.prune_sessions(), 1);
        assert_eq!(state.session_account("u1").as_deref(), Some("x"));
        assert!(state.session_account("u2").is_none());
    }
}
