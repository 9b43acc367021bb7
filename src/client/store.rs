//! Persisted client state under fixed keys.

use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::ClientError;
use crate::db::UserResponse;

pub const TOKEN_KEY: &str = "enigma_token";
pub const USER_KEY: &str = "enigma_user";
pub const ORGANIZATIONS_KEY: &str = "enigma_organizations";

/// String key-value storage that outlives a single run of the client
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), ClientError>;
    fn remove(&self, key: &str) -> Result<(), ClientError>;

    fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Cached user projection; unreadable entries count as absent
    fn user(&self) -> Option<UserResponse> {
        self.get(USER_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    fn save_session(&self, token: &str, user: &UserResponse) -> Result<(), ClientError> {
        let user = serde_json::to_string(user).map_err(|e| ClientError::Store(e.to_string()))?;
        self.set(TOKEN_KEY, token.to_string())?;
        self.set(USER_KEY, user)
    }

    fn clear_session(&self) -> Result<(), ClientError> {
        self.remove(TOKEN_KEY)?;
        self.remove(USER_KEY)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) -> Result<(), ClientError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// All keys in one JSON object on disk, rewritten on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file starts empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| ClientError::Store(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(ClientError::Store(format!("{}: {}", path.display(), e))),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ClientError::Store(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(entries).map_err(|e| ClientError::Store(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| ClientError::Store(format!("{}: {}", self.path.display(), e)))
    }

    fn update<F>(&self, change: F) -> Result<(), ClientError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::Store("session store lock poisoned".to_string()))?;
        change(&mut entries);
        self.persist(&entries)
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), ClientError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
