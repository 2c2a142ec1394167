//! Ephemeral key-value storage for undo records.
//!
//! The engine needs only set-once, get, delete and passive expiry. Two
//! backends ship with the crate:
//! - `MemoryUndoStore`: moka cache with per-entry time-to-live;
//! - `FileUndoStore`: one JSON envelope per key under a directory, so
//!   tokens survive between CLI invocations.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt entry for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Key-value contract used for undo records
pub trait UndoStore {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store backed by a moka cache
pub struct MemoryUndoStore {
    cache: Cache<String, Entry>,
}

impl MemoryUndoStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();
        Self { cache }
    }
}

impl Default for MemoryUndoStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl UndoStore for MemoryUndoStore {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.cache.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl,
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cache.get(key).map(|e| e.value))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.cache.invalidate(key);
        Ok(())
    }
}

/// On-disk envelope; the key itself is never written
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    expires_at: DateTime<Utc>,
    value: String,
}

/// Directory-backed store with passive expiry
#[derive(Debug, Clone)]
pub struct FileUndoStore {
    dir: PathBuf,
}

impl FileUndoStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entry file for `key`: blake3 of the key so capability tokens stay off disk
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes());
        self.dir.join(format!("{}.json", digest.to_hex()))
    }

    fn read_envelope(&self, path: &Path, key: &str) -> Result<Option<Envelope>, StoreError> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Remove expired and unreadable entries; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let expired = match fs::read_to_string(&path)
                .ok()
                .and_then(|t| serde_json::from_str::<Envelope>(&t).ok())
            {
                Some(env) => env.expires_at <= now,
                None => true,
            };
            if expired {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to purge entry"),
                }
            }
        }
        debug!(removed, dir = %self.dir.display(), "purged undo store");
        Ok(removed)
    }
}

impl UndoStore for FileUndoStore {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Unavailable(format!("invalid ttl: {e}")))?;
        let envelope = Envelope {
            expires_at: Utc::now() + ttl,
            value: value.to_string(),
        };
        let text = serde_json::to_string(&envelope).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        // Stage in the same directory, then rename into place
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.entry_path(key))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        let Some(envelope) = self.read_envelope(&path, key)? else {
            return Ok(None);
        };
        if envelope.expires_at <= Utc::now() {
            debug!(path = %path.display(), "entry expired");
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
