use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::StorageAdapter;
use crate::error::StorageError;

/// Storage file name inside the storage directory
const STORAGE_FILE: &str = "storage.json";

/// Key/value storage persisted as one JSON document.
///
/// The document is read on first access and rewritten after every change.
/// Writes go to a temporary file that is renamed over the old one, so a
/// crash mid-write leaves the previous contents intact.
pub struct FileStorage {
    dir: PathBuf,
    items: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            items: Mutex::new(None),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORAGE_FILE)
    }

    async fn read_file(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(items).map_err(|source| StorageError::Corrupt {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), entries = items.len(), "Storage file written");
        Ok(())
    }

    /// Run `f` against the loaded map, loading it first if needed.
    async fn with_items<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self.items.lock().await;
        if guard.is_none() {
            *guard = Some(Self::read_file(&self.path()).await?);
        }
        let items = guard.get_or_insert_with(BTreeMap::new);
        Ok(f(items))
    }

    /// Apply a mutation and persist it. The in-memory copy is discarded if
    /// the write fails so the next access re-reads the file.
    async fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StorageError> {
        let mut guard = self.items.lock().await;
        if guard.is_none() {
            *guard = Some(Self::read_file(&self.path()).await?);
        }
        let items = guard.get_or_insert_with(BTreeMap::new);
        f(items);
        if let Err(e) = self.write_file(items).await {
            *guard = None;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_items(|items| items.get(key).cloned()).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            items.remove(key);
        })
        .await
    }

    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError> {
        self.with_items(|items| items.keys().cloned().collect()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("cache"));
        storage.set_item("@FirebaseLocalCache:value:items/a", "\"Lamp\"").await.unwrap();
        storage.set_item("other", "1").await.unwrap();

        let reopened = FileStorage::new(dir.path().join("cache"));
        assert_eq!(
            reopened.get_item("@FirebaseLocalCache:value:items/a").await.unwrap(),
            Some("\"Lamp\"".to_string())
        );
        assert_eq!(reopened.get_all_keys().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.get_item("nope").await.unwrap(), None);
        assert!(storage.get_all_keys().await.unwrap().is_empty());
        assert!(!storage.path().exists());
    }

    #[tokio::test]
    async fn test_remove_item() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set_item("a", "1").await.unwrap();
        storage.remove_item("a").await.unwrap();
        storage.remove_item("never-there").await.unwrap();

        let reopened = FileStorage::new(dir.path());
        assert_eq!(reopened.get_item("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), "not json").unwrap();
        let storage = FileStorage::new(dir.path());
        let err = storage.get_item("a").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
