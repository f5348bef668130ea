//! Persistence port for the consent record, plus in-memory and file backends.
//!
//! The manager only ever speaks to [`ConsentStorage`]; whether the bytes end
//! up in a browser cookie, a file or a test map is the backend's business.
//! Every backend honours the expiry it is given: an expired entry reads as
//! absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bulwark_core::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Small durable key-value store with per-entry expiry.
pub trait ConsentStorage: Send + Sync {
    /// Read a live value. Expired or missing entries yield `None`.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`, expiring at `expires_at`.
    fn write(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Remove the value under `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// ---------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------

/// Process-local storage. Used by tests and by callers that accept losing
/// consent on restart.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConsentStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(Utc::now()) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.entries.lock().insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------

/// Storage backed by a single JSON document on disk.
///
/// The file is re-read on every access so separate processes (the CLI and a
/// running server, say) observe each other's writes.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, StoredEntry>> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) if data.trim().is_empty() => Ok(HashMap::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &HashMap<String, StoredEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        debug!("Saved consent store to {}", self.path.display());
        Ok(())
    }

    /// Load for modification; an unreadable document is discarded rather than
    /// blocking every future write.
    fn load_for_write(&self) -> Result<HashMap<String, StoredEntry>> {
        match self.load() {
            Ok(entries) => Ok(entries),
            Err(Error::Json(e)) => {
                warn!(
                    "Discarding corrupt consent store {}: {}",
                    self.path.display(),
                    e
                );
                Ok(HashMap::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl ConsentStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        let entries = self.load()?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    fn write(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock.lock();
        let now = Utc::now();
        let mut entries = self.load_for_write()?;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        self.save(&entries)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load_for_write()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
