//! Suspension store: `suspended.json`.
//!
//! Channels and accounts are suspended independently. A record is active
//! while its expiry is strictly in the future; unsuspending moves the
//! expiry into the past and keeps the record.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{JsonStore, canonical, now_ts};
use crate::error::StoreError;

/// One suspension record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    /// Expiry as Unix seconds.
    pub until: i64,
    pub reason: String,
}

impl Suspension {
    pub fn is_active_at(&self, now: i64) -> bool {
        self.until > now
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SuspensionDoc {
    #[serde(default)]
    chans: BTreeMap<String, Suspension>,
    #[serde(default)]
    accs: BTreeMap<String, Suspension>,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Channel,
    Account,
}

impl SuspensionDoc {
    fn table(&mut self, kind: Kind) -> &mut BTreeMap<String, Suspension> {
        match kind {
            Kind::Channel => &mut self.chans,
            Kind::Account => &mut self.accs,
        }
    }

    fn table_ref(&self, kind: Kind) -> &BTreeMap<String, Suspension> {
        match kind {
            Kind::Channel => &self.chans,
            Kind::Account => &self.accs,
        }
    }
}

/// Channel and account suspensions.
pub struct SuspensionStore {
    inner: JsonStore<SuspensionDoc>,
}

impl SuspensionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            inner: JsonStore::open(path.as_ref())?,
        })
    }

    /// Active channel suspension, if any.
    pub fn channel(&self, channel: &str) -> Option<Suspension> {
        self.active(Kind::Channel, channel)
    }

    /// Active account suspension, if any.
    pub fn account(&self, account: &str) -> Option<Suspension> {
        self.active(Kind::Account, account)
    }

    pub fn is_channel_suspended(&self, channel: &str) -> bool {
        self.channel(channel).is_some()
    }

    pub fn is_account_suspended(&self, account: &str) -> bool {
        self.account(account).is_some()
    }

    pub fn suspend_channel(&self, channel: &str, until: i64, reason: &str) -> Result<(), StoreError> {
        self.suspend_many(Kind::Channel, &[channel.to_string()], until, reason)
    }

    pub fn suspend_account(&self, account: &str, until: i64, reason: &str) -> Result<(), StoreError> {
        self.suspend_many(Kind::Account, &[account.to_string()], until, reason)
    }

    /// Suspend several accounts in one flush.
    pub fn suspend_accounts(&self, accounts: &[String], until: i64, reason: &str) -> Result<(), StoreError> {
        self.suspend_many(Kind::Account, accounts, until, reason)
    }

    /// Force the channel's suspension to expire. Returns whether one was active.
    pub fn unsuspend_channel(&self, channel: &str) -> Result<bool, StoreError> {
        self.expire_many(Kind::Channel, &[channel.to_string()])
    }

    pub fn unsuspend_account(&self, account: &str) -> Result<bool, StoreError> {
        self.expire_many(Kind::Account, &[account.to_string()])
    }

    pub fn unsuspend_accounts(&self, accounts: &[String]) -> Result<bool, StoreError> {
        self.expire_many(Kind::Account, accounts)
    }

    /// Delete the channel's record outright (purge).
    pub fn remove_channel(&self, channel: &str) -> Result<bool, StoreError> {
        let key = canonical(channel);
        self.inner.update(|d| {
            let removed = d.chans.remove(&key).is_some();
            (removed, removed)
        })
    }

    fn active(&self, kind: Kind, name: &str) -> Option<Suspension> {
        let key = canonical(name);
        let now = now_ts();
        self.inner.read(|d| {
            d.table_ref(kind)
                .get(&key)
                .filter(|s| s.is_active_at(now))
                .cloned()
        })
    }

    fn suspend_many(&self, kind: Kind, names: &[String], until: i64, reason: &str) -> Result<(), StoreError> {
        self.inner.update(|d| {
            let table = d.table(kind);
            for name in names {
                table.insert(
                    canonical(name),
                    Suspension {
                        until,
                        reason: reason.to_string(),
                    },
                );
            }
            ((), !names.is_empty())
        })
    }

    fn expire_many(&self, kind: Kind, names: &[String]) -> Result<bool, StoreError> {
        let now = now_ts();
        self.inner.update(|d| {
            let mut any = false;
            for name in names {
                if let Some(record) = d.table(kind).get_mut(&canonical(name))
                    && record.is_active_at(now)
                {
                    record.until = now - 1;
                    any = true;
                }
            }
            (any, any)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SuspensionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SuspensionStore::open(dir.path().join("suspended.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn active_until_expiry_then_unsuspend_is_immediate() {
        let (_dir, store) = store();
        let until = now_ts() + 3 * 86_400;
        store.suspend_account("Alice", until, "abuse").unwrap();
        assert!(store.is_account_suspended("alice"));
        assert_eq!(store.account("ALICE").unwrap().reason, "abuse");

        assert!(store.unsuspend_account("alice").unwrap());
        assert!(!store.is_account_suspended("alice"));
        assert!(!store.unsuspend_account("alice").unwrap());
    }

    #[test]
    fn expired_records_are_inactive_but_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suspended.json");
        let store = SuspensionStore::open(&path).unwrap();
        store.suspend_channel("#old", now_ts() - 10, "past").unwrap();
        assert!(!store.is_channel_suspended("#old"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("#old"));
    }

    #[test]
    fn channel_and_account_keys_are_independent() {
        let (_dir, store) = store();
        store.suspend_channel("#x", now_ts() + 60, "r").unwrap();
        assert!(store.is_channel_suspended("#X"));
        assert!(!store.is_account_suspended("#x"));
        assert!(store.remove_channel("#x").unwrap());
        assert!(!store.is_channel_suspended("#x"));
    }

    #[test]
    fn bulk_suspend_and_unsuspend() {
        let (_dir, store) = store();
        let accts = vec!["a".to_string(), "B".to_string()];
        store.suspend_accounts(&accts, now_ts() + 60, "cascade").unwrap();
        assert!(store.is_account_suspended("b"));
        assert!(store.unsuspend_accounts(&accts).unwrap());
        assert!(!store.is_account_suspended("a"));
    }
}
