//! Persistent key/value storage used for cached records.
//!
//! This module provides the `StorageAdapter` trait and two implementations:
//! - `MemoryStorage`: process-local map, used by tests
//! - `FileStorage`: a single JSON document on disk
//!
//! Keys are plain strings and values are opaque serialized payloads.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::StorageError;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Asynchronous key/value store.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns `None` when the key is absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError>;
}
