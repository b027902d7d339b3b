//! Key-value persistence modeled on extension local storage.
//!
//! [`KeyValueStore`] is the narrow capability the rest of the crate depends
//! on. [`FileStore`] keeps one JSON document in the local data directory,
//! [`MemoryStore`] keeps everything in process.

mod credentials;

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use serde_json::{Map, Value};

use crate::error::StorageError;

pub use credentials::{
    CredentialStore, KEY_ACCESS_TOKEN, KEY_CLIENT_ID, KEY_CODE_VERIFIER, KEY_EXPIRES_AT,
    KEY_PENDING_CREATED_AT, KEY_REFRESH_TOKEN, KEY_STATE,
};

pub trait KeyValueStore {
    /// Returns the entries that exist among `keys`.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError>;

    /// Writes all entries at once.
    async fn set(&self, entries: Map<String, Value>) -> Result<(), StorageError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, new_entries: Map<String, Value>) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.extend(new_entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// JSON document on disk. Every write replaces the whole document through a
/// temporary file and a rename, so a set of keys lands together or not at all.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<data_local_dir>/spotsearch/storage.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("spotsearch/storage.json");
        path
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StorageError> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::NotAnObject),
        }
    }

    async fn persist(&self, document: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        async_fs::write(&tmp, json).await?;
        async_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError> {
        let mut document = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|k| document.remove(*k).map(|v| (k.to_string(), v)))
            .collect())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), StorageError> {
        let mut document = self.load().await?;
        document.extend(entries);
        self.persist(&document).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut document = self.load().await?;
        let before = document.len();
        for key in keys {
            document.remove(*key);
        }
        if document.len() == before {
            return Ok(());
        }
        self.persist(&document).await
    }
}
