use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use super::context::SessionProvider;
use super::session::Session;

/// Storage key the session is persisted under
pub const SESSION_KEY: &str = "user";

/// Extension used for file-backed entries
const ENTRY_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session storage: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Synchronous key-value persistence surface.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Replace the value for `key`. Readers see either the old or the new
    /// value, never a partial write.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        // Write beside the target and rename over it
        let tmp = self
            .dir
            .join(format!(".{}.{:016x}.tmp", key, rand::random::<u64>()));
        std::fs::write(&tmp, value)?;
        if let Err(e) = std::fs::rename(&tmp, self.entry_path(key)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-process storage, used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Persists the single current `Session` under `SESSION_KEY`.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load the stored session.
    ///
    /// A value that does not parse (or has no username) is discarded and
    /// reported as absent. Only storage I/O failures are returned as errors.
    pub fn try_load(&self) -> Result<Option<Session>, StoreError> {
        let Some(raw) = self.storage.get(SESSION_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if session.is_well_formed() => Ok(Some(session)),
            Ok(_) => {
                warn!("Stored session has no username, discarding");
                self.discard();
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse stored session, discarding");
                self.discard();
                Ok(None)
            }
        }
    }

    /// Load the stored session, treating every failure as "no session".
    pub fn load(&self) -> Option<Session> {
        match self.try_load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                None
            }
        }
    }

    /// Save the session, replacing whatever was stored before
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let contents = serde_json::to_string(session)?;
        self.storage.set(SESSION_KEY, &contents)?;
        debug!(username = %session.username, "Session saved");
        Ok(())
    }

    /// Remove the stored session
    pub fn clear(&self) -> Result<(), StoreError> {
        self.storage.remove(SESSION_KEY)?;
        debug!("Session cleared");
        Ok(())
    }

    fn discard(&self) {
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            warn!(error = %e, "Failed to remove corrupt session entry");
        }
    }
}

impl SessionProvider for SessionStore {
    fn access_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .try_load()?
            .and_then(|s| s.token().map(str::to_string)))
    }
}
