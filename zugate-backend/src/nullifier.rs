//! Consumed-nullifier tracking.
//!
//! Every accepted proof permanently spends its nullifier hash; a second
//! proof carrying the same hash must be rejected no matter which session
//! submits it. The store's only write path is a single insert-if-absent,
//! which is what makes the at-most-once guarantee hold under concurrent
//! logins. Entries are never evicted.

use std::{
    collections::HashSet,
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};

use sled::Db;

const NULLIFIER_DB_ENV: &str = "ZUGATE_NULLIFIER_DB";

/// Process-wide set of spent nullifiers.
#[derive(Clone)]
pub struct NullifierStore {
    backend: Arc<NullifierBackend>,
}

enum NullifierBackend {
    InMemory(Mutex<HashSet<String>>),
    Persistent(Db),
}

impl NullifierStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(NullifierBackend::InMemory(Mutex::new(HashSet::new()))),
        }
    }

    pub fn persistent(path: impl AsRef<Path>) -> Self {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).unwrap_or_else(|err| {
                    panic!(
                        "failed to create directory for nullifier db at {}: {}",
                        path_ref.display(),
                        err
                    )
                });
            }
        }
        let db = sled::open(path_ref).unwrap_or_else(|err| {
            panic!(
                "failed to open nullifier db at {}: {}",
                path_ref.display(),
                err
            )
        });
        Self {
            backend: Arc::new(NullifierBackend::Persistent(db)),
        }
    }

    /// In-memory unless `ZUGATE_NULLIFIER_DB` points at a sled path.
    pub fn from_env() -> Self {
        match env::var(NULLIFIER_DB_ENV) {
            Ok(path) => Self::persistent(path),
            Err(_) => Self::in_memory(),
        }
    }

    pub fn contains(&self, nullifier: &str) -> Result<bool, String> {
        match &*self.backend {
            NullifierBackend::InMemory(store) => Ok(store
                .lock()
                .expect("nullifier store poisoned")
                .contains(nullifier)),
            NullifierBackend::Persistent(db) => db
                .contains_key(nullifier.as_bytes())
                .map_err(|err| format!("nullifier db contains_key error: {err}")),
        }
    }

    /// Atomically spend a nullifier. Returns `true` iff this was its first
    /// use. Check-then-insert as two calls would race; this is the one
    /// write primitive login is allowed to use.
    pub fn insert(&self, nullifier: &str) -> Result<bool, String> {
        match &*self.backend {
            NullifierBackend::InMemory(store) => Ok(store
                .lock()
                .expect("nullifier store poisoned")
                .insert(nullifier.to_string())),
            NullifierBackend::Persistent(db) => {
                let previous = db
                    .insert(nullifier.as_bytes(), &[])
                    .map_err(|err| format!("nullifier db insert error: {err}"))?;
                Ok(previous.is_none())
            }
        }
    }
}
