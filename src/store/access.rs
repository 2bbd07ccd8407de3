//! Channel access store: `chan_access.json`.
//!
//! Per channel: an optional owner and a map of account → level. The owner's
//! effective level is always [`OWNER_LEVEL`], whatever the map says.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{JsonStore, canonical};
use crate::error::StoreError;

/// Level implied by channel ownership, and the maximum grantable level.
pub const OWNER_LEVEL: u16 = 500;

/// Access list for one channel. Account keys are canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccess {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub levels: BTreeMap<String, u16>,
}

impl ChannelAccess {
    fn level_of(&self, account: &str) -> u16 {
        if self.owner.as_deref() == Some(account) {
            return OWNER_LEVEL;
        }
        self.levels.get(account).copied().unwrap_or(0)
    }
}

/// Channel access lists keyed by canonical channel name.
pub struct AccessStore {
    inner: JsonStore<BTreeMap<String, ChannelAccess>>,
}

impl AccessStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            inner: JsonStore::open(path.as_ref())?,
        })
    }

    pub fn owner(&self, channel: &str) -> Option<String> {
        let chan = canonical(channel);
        self.inner
            .read(|d| d.get(&chan).and_then(|c| c.owner.clone()))
    }

    pub fn is_owner(&self, channel: &str, account: &str) -> bool {
        let acct = canonical(account);
        self.owner(channel).is_some_and(|o| o == acct)
    }

    /// Effective level: 500 for the owner, the stored level otherwise, 0 if absent.
    pub fn level(&self, channel: &str, account: &str) -> u16 {
        let (chan, acct) = (canonical(channel), canonical(account));
        self.inner
            .read(|d| d.get(&chan).map_or(0, |c| c.level_of(&acct)))
    }

    /// Make `account` the owner of `channel` (creating the list if needed).
    pub fn set_owner(&self, channel: &str, account: &str) -> Result<(), StoreError> {
        let (chan, acct) = (canonical(channel), canonical(account));
        self.inner.update(|d| {
            let entry = d.entry(chan).or_default();
            entry.levels.insert(acct.clone(), OWNER_LEVEL);
            entry.owner = Some(acct);
            ((), true)
        })
    }

    /// Set an account's level, clamped to `0..=500`.
    ///
    /// Level 0 removes a non-owner. Any change to the owner is a no-op.
    /// Returns whether the stored list changed.
    pub fn set_level(&self, channel: &str, account: &str, level: u16) -> Result<bool, StoreError> {
        let (chan, acct) = (canonical(channel), canonical(account));
        let level = level.min(OWNER_LEVEL);
        self.inner.update(|d| {
            if d.get(&chan).and_then(|c| c.owner.as_ref()) == Some(&acct) {
                return (false, false);
            }
            if level == 0 {
                let removed = d
                    .get_mut(&chan)
                    .is_some_and(|c| c.levels.remove(&acct).is_some());
                return (removed, removed);
            }
            let entry = d.entry(chan).or_default();
            let changed = entry.levels.insert(acct, level) != Some(level);
            (changed, changed)
        })
    }

    /// Entries sorted by level descending, then account ascending. The
    /// owner is always listed at 500.
    pub fn list(&self, channel: &str) -> Vec<(String, u16)> {
        let chan = canonical(channel);
        let mut entries = self.inner.read(|d| {
            let Some(access) = d.get(&chan) else {
                return Vec::new();
            };
            let mut out: Vec<(String, u16)> = access
                .levels
                .keys()
                .map(|acct| (acct.clone(), access.level_of(acct)))
                .collect();
            if let Some(owner) = &access.owner
                && !access.levels.contains_key(owner)
            {
                out.push((owner.clone(), OWNER_LEVEL));
            }
            out
        });
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    /// Every account named on the list, owner included.
    pub fn accounts(&self, channel: &str) -> Vec<String> {
        self.list(channel).into_iter().map(|(acct, _)| acct).collect()
    }

    /// Drop the channel's whole list. Returns whether one existed.
    pub fn remove_channel(&self, channel: &str) -> Result<bool, StoreError> {
        let chan = canonical(channel);
        self.inner.update(|d| {
            let removed = d.remove(&chan).is_some();
            (removed, removed)
        })
    }
}
