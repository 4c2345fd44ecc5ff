//! Credential persistence.
//!
//! The bearer credential is cached between runs so a restart does not force
//! a new login. Stored at:
//!
//! ```text
//! <state_dir>/credential.json   # {"token": "...", "savedAt": "..."}
//! ```
//!
//! Callers treat every write as best effort; the session store never depends
//! on a save having succeeded.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};
use crate::types::Credential;

/// Durable key-value slot for the session credential.
pub trait CredentialStore: Send + Sync {
    /// Load the cached credential, `None` if nothing is stored.
    fn load(&self) -> ChatResult<Option<Credential>>;

    fn save(&self, credential: &Credential) -> ChatResult<()>;

    /// Remove the cached credential. Clearing an empty store is not an error.
    fn clear(&self) -> ChatResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    token: String,
    #[serde(rename = "savedAt")]
    saved_at: DateTime<Utc>,
}

/// Credential cached as a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> ChatResult<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let stored: StoredCredential = serde_json::from_str(&content)?;
        if stored.token.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential::new(stored.token)))
    }

    fn save(&self, credential: &Credential) -> ChatResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredCredential {
            token: credential.as_str().to_string(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> ChatResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process credential slot, for tests and embedders without a disk.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<Credential>>,
    read_only: bool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that starts out holding a credential
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: RwLock::new(Some(credential)),
            read_only: false,
        }
    }

    /// Store whose writes always fail
    pub fn read_only() -> Self {
        Self {
            slot: RwLock::new(None),
            read_only: true,
        }
    }

    pub fn current(&self) -> Option<Credential> {
        self.slot.read().clone()
    }

    fn check_writable(&self) -> ChatResult<()> {
        if self.read_only {
            return Err(ChatError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "credential store is read-only",
            )));
        }
        Ok(())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> ChatResult<Option<Credential>> {
        Ok(self.current())
    }

    fn save(&self, credential: &Credential) -> ChatResult<()> {
        self.check_writable()?;
        *self.slot.write() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> ChatResult<()> {
        self.check_writable()?;
        *self.slot.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_roundtrip() {
        let temp = tempdir().unwrap();
        let store = FileCredentialStore::new(temp.path().join("state").join("credential.json"));

        assert!(store.load().unwrap().is_none());

        store.save(&Credential::new("abc")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Credential::new("abc")));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_clear_missing_file_is_ok() {
        let temp = tempdir().unwrap();
        let store = FileCredentialStore::new(temp.path().join("credential.json"));
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("credential.json");
        fs::write(&path, "not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(matches!(store.load(), Err(ChatError::Serialization(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::new();
        store.save(&Credential::new("t")).unwrap();
        assert_eq!(store.current(), Some(Credential::new("t")));
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());

        let store = MemoryCredentialStore::read_only();
        assert!(store.save(&Credential::new("t")).is_err());
        assert!(store.current().is_none());
    }
}
