//! Persistent store capability.
//!
//! A durable key-value store that survives restarts, in the role browser local
//! storage plays for a web client. Only three keys are ever written; see
//! [`keys`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Keys written by the session manager.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "token";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const USER: &str = "user";

    /// Removal order used when clearing: the access token goes first so a
    /// half-cleared store never looks like a usable session.
    pub const ALL: [&str; 3] = [ACCESS_TOKEN, REFRESH_TOKEN, USER];
}

/// A durable string key-value store.
///
/// No atomicity is required across keys.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Get a value by key. Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every session key. Keeps going past failures and reports the first.
    async fn clear(&self) -> Result<(), StoreError> {
        let mut first_err = None;
        for key in keys::ALL {
            if let Err(e) = self.remove(key).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ─── Memory ─────────────────────────────────────────────────────────

/// In-memory store. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Get a snapshot of all entries (for debugging/testing).
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ─── File ───────────────────────────────────────────────────────────

/// JSON-object file store.
///
/// Every write rewrites the whole file through a sibling temp file and a
/// rename, so a crash leaves either the old or the new file, never a torn one.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(HashMap::new()),
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        let data = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Load for a mutation. A corrupt file is discarded rather than blocking
    /// every later write; the session manager treats it as absent state anyway.
    async fn load_for_write(&self) -> Result<HashMap<String, String>, StoreError> {
        match self.load().await {
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!(%reason, "discarding corrupt session file");
                Ok(HashMap::new())
            }
            other => other,
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_for_write().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_for_write().await?;
        if entries.remove(key).is_none() && !self.path.exists() {
            return Ok(());
        }
        self.save(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("chat-session-test-{}", uuid::Uuid::new_v4()))
            .join("session.json")
    }

    #[tokio::test]
    async fn test_memory_store_basics() {
        let store = MemoryStore::new();
        assert_eq!(store.get(keys::USER).await.unwrap(), None);

        store.set(keys::USER, "{}").await.unwrap();
        assert_eq!(store.get(keys::USER).await.unwrap().as_deref(), Some("{}"));

        store.remove(keys::USER).await.unwrap();
        assert_eq!(store.get(keys::USER).await.unwrap(), None);
        store.remove(keys::USER).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_removes_all_session_keys_only() {
        let store = MemoryStore::with_entries([
            (keys::ACCESS_TOKEN, "T"),
            (keys::REFRESH_TOKEN, "R"),
            (keys::USER, "{}"),
            ("theme", "dark"),
        ]);
        store.clear().await.unwrap();
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("theme").map(String::as_str), Some("dark"));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let path = temp_path();
        {
            let store = FileStore::new(&path);
            store.set(keys::ACCESS_TOKEN, "T1").await.unwrap();
            store.set(keys::REFRESH_TOKEN, "R1").await.unwrap();
        }

        let store = FileStore::new(&path);
        assert_eq!(store.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(), Some("T1"));
        assert_eq!(store.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(), Some("R1"));

        store.clear().await.unwrap();
        assert_eq!(store.get(keys::ACCESS_TOKEN).await.unwrap(), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let path = temp_path();
        let store = FileStore::new(&path);
        assert_eq!(store.get(keys::USER).await.unwrap(), None);
        store.remove(keys::USER).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(keys::USER).await,
            Err(StoreError::Corrupt(_))
        ));

        // Clearing repairs the file.
        store.clear().await.unwrap();
        assert_eq!(store.get(keys::USER).await.unwrap(), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
