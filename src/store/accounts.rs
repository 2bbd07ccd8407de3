//! Account store: `accounts.json`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{JsonStore, canonical, now_ts};
use crate::error::StoreError;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Name as registered, for display.
    pub name: String,
    /// Password hash (PHC string, or a legacy bcrypt hash).
    pub hash: String,
    pub created_ts: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsDoc {
    #[serde(default)]
    accounts: BTreeMap<String, Account>,
}

/// Registered accounts keyed by canonical name.
pub struct AccountStore {
    inner: JsonStore<AccountsDoc>,
}

impl AccountStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            inner: JsonStore::open(path.as_ref())?,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read(|d| d.accounts.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn exists(&self, name: &str) -> bool {
        let key = canonical(name);
        self.inner.read(|d| d.accounts.contains_key(&key))
    }

    pub fn get(&self, name: &str) -> Option<Account> {
        let key = canonical(name);
        self.inner.read(|d| d.accounts.get(&key).cloned())
    }

    /// Registered spelling of `name`, if the account exists.
    pub fn display_name(&self, name: &str) -> Option<String> {
        self.get(name).map(|a| a.name)
    }

    /// Create an account. Returns `false` if the name is taken.
    pub fn create(&self, name: &str, hash: String) -> Result<bool, StoreError> {
        let key = canonical(name);
        let display = name.trim().to_string();
        self.inner.update(|d| {
            if d.accounts.contains_key(&key) {
                return (false, false);
            }
            d.accounts.insert(
                key,
                Account {
                    name: display,
                    hash,
                    created_ts: now_ts(),
                },
            );
            (true, true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_case_insensitive_and_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let store = AccountStore::open(&path).unwrap();

        assert!(store.create("Alice", "h1".into()).unwrap());
        assert!(!store.create("ALICE", "h2".into()).unwrap());
        assert!(store.exists("alice"));
        assert_eq!(store.display_name("aLiCe").as_deref(), Some("Alice"));

        let reopened = AccountStore::open(&path).unwrap();
        let acct = reopened.get("alice").unwrap();
        assert_eq!(acct.hash, "h1");
        assert!(acct.created_ts > 0);
    }

    #[test]
    fn reads_existing_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(
            &path,
            r#"{"accounts":{"bob":{"name":"Bob","hash":"$argon2id$x","created_ts":1700000000}}}"#,
        )
        .unwrap();
        let store = AccountStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("BOB").unwrap().created_ts, 1_700_000_000);
    }
}
