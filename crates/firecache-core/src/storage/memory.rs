use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StorageAdapter;
use crate::error::StorageError;

/// In-memory storage. Data lives as long as the value.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
    fail_writes: RwLock<Option<String>>,
    fail_reads: RwLock<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set_item`/`remove_item` fail with `reason`.
    pub async fn fail_writes(&self, reason: &str) {
        *self.fail_writes.write().await = Some(reason.to_string());
    }

    pub async fn restore_writes(&self) {
        *self.fail_writes.write().await = None;
    }

    /// Make every subsequent `get_item`/`get_all_keys` fail with `reason`.
    pub async fn fail_reads(&self, reason: &str) {
        *self.fail_reads.write().await = Some(reason.to_string());
    }

    pub async fn restore_reads(&self) {
        *self.fail_reads.write().await = None;
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    async fn check_writable(&self) -> Result<(), StorageError> {
        match self.fail_writes.read().await.as_ref() {
            Some(reason) => Err(StorageError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn check_readable(&self) -> Result<(), StorageError> {
        match self.fail_reads.read().await.as_ref() {
            Some(reason) => Err(StorageError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_readable().await?;
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable().await?;
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable().await?;
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_readable().await?;
        Ok(self.items.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("a").await.unwrap(), None);

        storage.set_item("a", "1").await.unwrap();
        assert_eq!(storage.get_item("a").await.unwrap(), Some("1".to_string()));

        storage.remove_item("a").await.unwrap();
        storage.remove_item("a").await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_all_keys_sorted() {
        let storage = MemoryStorage::new();
        storage.set_item("b", "2").await.unwrap();
        storage.set_item("a", "1").await.unwrap();
        assert_eq!(storage.get_all_keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let storage = MemoryStorage::new();
        storage.fail_writes("disk full").await;
        let err = storage.set_item("a", "1").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(ref r) if r == "disk full"));

        storage.restore_writes().await;
        storage.set_item("a", "1").await.unwrap();
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1").await.unwrap();
        storage.fail_reads("locked").await;
        assert!(matches!(
            storage.get_item("a").await.unwrap_err(),
            StorageError::Unavailable(ref r) if r == "locked"
        ));
        assert!(storage.get_all_keys().await.is_err());

        storage.restore_reads().await;
        assert_eq!(storage.get_item("a").await.unwrap(), Some("1".to_string()));
    }
}
