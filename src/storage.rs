//! Durable key/value persistence for tracker and detector state.
//!
//! The backend is a deliberately small seam: `get`/`set` over string keys,
//! scoped to one user profile. Key names match the web client's localStorage
//! namespaces so state exported from the browser app can be adopted directly.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, TrackerError};

/// Namespace for the per-property engagement log.
pub const TRACKING_KEY: &str = "propertyTracking";

/// Namespace for per-user liked/viewed state and preferences.
pub const USER_KEY: &str = "userPropertyData";

/// Namespace for the notification cooldown ledger.
pub const LEDGER_KEY: &str = "biddingWarNotifications";

/// Durable string key/value storage. Implementations must be safe to share
/// across tasks; callers serialize read-modify-write sequences themselves.
pub trait PersistenceBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Ephemeral backend for tests and for degrading gracefully when no durable
/// storage is available.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// Stores each namespace as `<dir>/<key>.json`.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open a backend rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .map_err(|e| TrackerError::StorageUnavailable(format!("create {}: {}", dir.display(), e)))?;
        }
        Ok(Self { dir })
    }

    /// Open the default per-user state directory (`~/.bidwatch`).
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| TrackerError::StorageUnavailable("home directory not found".to_string()))?;
        Self::open(home.join(".bidwatch"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl PersistenceBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| TrackerError::StorageUnavailable(format!("read {}: {}", path.display(), e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, value)
            .map_err(|e| TrackerError::StorageUnavailable(format!("write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();
        assert!(backend.get("missing").unwrap().is_none());

        backend.set(TRACKING_KEY, "{}").unwrap();
        assert_eq!(backend.get(TRACKING_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        assert!(backend.get(USER_KEY).unwrap().is_none());
        backend.set(USER_KEY, r#"{"likedProperties":[]}"#).unwrap();
        assert_eq!(
            backend.get(USER_KEY).unwrap().as_deref(),
            Some(r#"{"likedProperties":[]}"#)
        );

        // A second open over the same dir sees the same data
        let reopened = FileBackend::open(dir.path()).unwrap();
        assert!(reopened.get(USER_KEY).unwrap().is_some());
    }

    #[test]
    fn test_file_backend_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("bidwatch");
        let backend = FileBackend::open(&nested).unwrap();
        backend.set(LEDGER_KEY, "{}").unwrap();
        assert!(nested.join("biddingWarNotifications.json").exists());
    }
}
