//! Key/value persistence for session and profile entries.
//!
//! Every entry is an independent string (usually JSON) under its own key, mirrored
//! to one file per key when a data directory is configured. Writes are synchronous
//! and best-effort: a failed write is logged and otherwise ignored.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct LocalStore {
    entries: RwLock<HashMap<String, String>>,
    dir: Option<PathBuf>,
}

impl LocalStore {
    /// Memory-only store.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store mirrored to `dir`. Existing entries are loaded eagerly; an unreadable
    /// directory degrades to an empty store.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut entries = HashMap::new();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(target: "store", dir = %dir.display(), error = %e, "Cannot create data dir; continuing in memory");
            return Self::default();
        }
        match std::fs::read_dir(&dir) {
            Ok(rd) => {
                for entry in rd.flatten() {
                    let path = entry.path();
                    let Some(key) = path.file_name().and_then(|n| n.to_str()).and_then(decode_key) else {
                        continue;
                    };
                    match std::fs::read_to_string(&path) {
                        Ok(v) => {
                            entries.insert(key, v);
                        }
                        Err(e) => warn!(target: "store", path = %path.display(), error = %e, "Skipping unreadable entry"),
                    }
                }
            }
            Err(e) => warn!(target: "store", dir = %dir.display(), error = %e, "Cannot list data dir"),
        }
        debug!(target: "store", dir = %dir.display(), entries = entries.len(), "Opened local store");
        Self { entries: RwLock::new(entries), dir: Some(dir) }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(dir) = &self.dir {
            let path = entry_path(dir, key);
            if let Err(e) = std::fs::write(&path, &value) {
                warn!(target: "store", %key, error = %e, "Persist failed");
            }
        }
        if let Ok(mut map) = self.entries.write() {
            map.insert(key.to_string(), value);
        }
    }

    pub fn remove(&self, key: &str) {
        if let Some(dir) = &self.dir {
            let path = entry_path(dir, key);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(target: "store", %key, error = %e, "Remove failed");
                }
            }
        }
        if let Ok(mut map) = self.entries.write() {
            map.remove(key);
        }
    }

    /// Remove every key starting with `prefix`.
    pub fn remove_prefix(&self, prefix: &str) {
        let keys: Vec<String> = match self.entries.read() {
            Ok(map) => map.keys().filter(|k| k.starts_with(prefix)).cloned().collect(),
            Err(_) => return,
        };
        for k in keys {
            self.remove(&k);
        }
    }

    /// Parsed JSON entry; a malformed entry reads as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(target: "store", %key, error = %e, "Ignoring malformed entry");
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(s) => self.set(key, s),
            Err(e) => warn!(target: "store", %key, error = %e, "Serialize failed"),
        }
    }
}

// Keys carry ids from outside (':' and '/' included); the URL-safe alphabet keeps
// every key a single file name inside `dir`.
fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.entry", URL_SAFE_NO_PAD.encode(key)))
}

fn decode_key(file_name: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(file_name.strip_suffix(".entry")?).ok()?;
    String::from_utf8(bytes).ok()
}
