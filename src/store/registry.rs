//! Channel registry: `state.json`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{JsonStore, canonical, now_ts};
use crate::error::StoreError;

/// A registered channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredChannel {
    /// Channel name as registered.
    pub name: String,
    /// Identity that issued the registration.
    pub owner_uid: String,
    /// Owning account at registration time.
    #[serde(default)]
    pub owner_account: String,
    pub created_ts: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDoc {
    #[serde(default)]
    channels: BTreeMap<String, RegisteredChannel>,
}

/// Registered channels keyed by canonical name.
pub struct RegistryStore {
    inner: JsonStore<RegistryDoc>,
}

impl RegistryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            inner: JsonStore::open(path.as_ref())?,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read(|d| d.channels.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, channel: &str) -> Option<RegisteredChannel> {
        let key = canonical(channel);
        self.inner.read(|d| d.channels.get(&key).cloned())
    }

    pub fn is_registered(&self, channel: &str) -> bool {
        self.get(channel).is_some()
    }

    /// Register a channel. Returns `false` if it already exists (any case).
    pub fn register(
        &self,
        channel: &str,
        owner_uid: &str,
        owner_account: &str,
    ) -> Result<bool, StoreError> {
        let key = canonical(channel);
        let entry = RegisteredChannel {
            name: channel.trim().to_string(),
            owner_uid: owner_uid.to_string(),
            owner_account: owner_account.to_string(),
            created_ts: now_ts(),
        };
        self.inner.update(|d| {
            if d.channels.contains_key(&key) {
                return (false, false);
            }
            d.channels.insert(key, entry);
            (true, true)
        })
    }

    pub fn remove(&self, channel: &str) -> Result<bool, StoreError> {
        let key = canonical(channel);
        self.inner.update(|d| {
            let removed = d.channels.remove(&key).is_some();
            (removed, removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_registration_in_any_case_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = RegistryStore::open(&path).unwrap();

        assert!(store.register("#Test", "042AAAAAB", "alice").unwrap());
        assert!(!store.register("#tEST", "042AAAAAC", "bob").unwrap());
        assert_eq!(store.len(), 1);

        let reopened = RegistryStore::open(&path).unwrap();
        let entry = reopened.get("#test").unwrap();
        assert_eq!(entry.name, "#Test");
        assert_eq!(entry.owner_uid, "042AAAAAB");
    }

    #[test]
    fn remove_allows_reregistration() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::open(dir.path().join("state.json")).unwrap();
        store.register("#a", "u", "x").unwrap();
        assert!(store.remove("#A").unwrap());
        assert!(store.register("#a", "u", "y").unwrap());
    }
}
