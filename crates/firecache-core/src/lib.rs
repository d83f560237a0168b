//! # firecache
//!
//! Local persistent caching for realtime-database listeners.
//!
//! When a consumer subscribes to a location, the last value persisted for it
//! is delivered immediately while the live listener is established. Live
//! values then replace the stale one, and the most recent value is written
//! back to storage when the listener is detached.
//!
//! ## Modules
//!
//! - `cache`: the `CacheManager` and listener options
//! - `database`: the remote listener seam and an in-process database
//! - `storage`: the persistent key/value seam and its adapters
//! - `config`: namespace and cache directory settings
//!
//! ## Example
//!
//! ```ignore
//! let cache = CacheManager::new(Arc::new(FileStorage::new(config.cache_dir()?)));
//! let item = db.reference("items/lamp");
//!
//! cache.on_value(
//!     &item,
//!     |_, snap| snap.child("name").val().clone(),
//!     |_, name| println!("{}", name),
//!     ListenOptions::<()>::new(),
//! ).await?;
//!
//! // Later: detach and persist the latest value.
//! cache.off_value(&item).await?;
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod storage;

#[cfg(test)]
mod testing;

pub use cache::{CacheManager, CancelOrContext, ListenOptions, DEFAULT_NAMESPACE};
pub use config::CacheConfig;
pub use database::{DataSnapshot, DatabaseRef, EventKind, MemoryDatabase, MemoryQuery, MemoryRef};
pub use error::{CacheError, DatabaseError, Result, StorageError};
pub use storage::{FileStorage, MemoryStorage, StorageAdapter};
