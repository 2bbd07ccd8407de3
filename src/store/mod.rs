//! Persistent JSON stores.
//!
//! Each store owns one JSON document behind a single read/write lock.
//! Readers run concurrently; a writer holds the lock across the mutation
//! and the flush, so saves are ordered and never interleave. Saves write a
//! temporary file, fsync it, then rename it over the target, so the
//! previous document survives a crash at any point.
//!
//! Keys are canonicalised with [`canonical`] at every store entry point;
//! callers pass names in whatever case they received them.

mod access;
mod accounts;
mod registry;
mod suspension;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::StoreError;

pub use access::{AccessStore, ChannelAccess, OWNER_LEVEL};
pub use accounts::{Account, AccountStore};
pub use registry::{RegisteredChannel, RegistryStore};
pub use suspension::{Suspension, SuspensionStore};

/// Canonical store key for a channel or account name.
pub fn canonical(name: &str) -> String {
    qserv_proto::irc_to_lower(name.trim())
}

/// Current wall-clock time as Unix seconds.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A JSON document guarded by a read/write lock.
pub struct JsonStore<T> {
    path: PathBuf,
    data: RwLock<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Load the document at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => T::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file absent, starting empty");
                T::default()
            }
            Err(source) => {
                return Err(StoreError::Load {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.data.read())
    }

    /// Run `f` under the write lock and flush if it reports a change.
    ///
    /// `f` returns `(result, changed)`. On a save error the mutation stays
    /// applied in memory; the next successful save persists it.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> (R, bool)) -> Result<R, StoreError> {
        let mut guard = self.data.write();
        let (result, changed) = f(&mut guard);
        if changed {
            write_atomic(&self.path, &*guard)?;
        }
        Ok(result)
    }

    /// Flush the current document unconditionally.
    pub fn save(&self) -> Result<(), StoreError> {
        let guard = self.data.write();
        write_atomic(&self.path, &*guard)
    }
}

/// Path of the temporary file used while saving `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` to `path` atomically (temp file, fsync, rename).
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let save_err = |source: std::io::Error| StoreError::Save {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(save_err)?;
    }

    // Write to temp file first
    let temp = temp_path(path);
    let file = File::create(&temp).map_err(save_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| save_err(std::io::Error::other(e)))?;
    writer.write_all(b"\n").map_err(save_err)?;
    let file = writer.into_inner().map_err(|e| save_err(e.into_error()))?;
    file.sync_all().map_err(save_err)?;
    drop(file);

    // Atomic rename
    fs::rename(&temp, path).map_err(save_err)?;

    debug!(path = %path.display(), "Store saved");
    Ok(())
}

/// All four stores, opened together at startup.
pub struct Stores {
    pub accounts: AccountStore,
    pub access: AccessStore,
    pub registry: RegistryStore,
    pub suspensions: SuspensionStore,
}

impl Stores {
    /// Open every store. Any load failure is fatal to startup.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let stores = Self {
            accounts: AccountStore::open(&config.accounts)?,
            access: AccessStore::open(&config.access)?,
            registry: RegistryStore::open(&config.registry)?,
            suspensions: SuspensionStore::open(&config.suspensions)?,
        };
        info!(
            accounts = stores.accounts.len(),
            channels = stores.registry.len(),
            "Loaded persistent stores"
        );
        Ok(stores)
    }
}
