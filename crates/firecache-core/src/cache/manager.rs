use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::context::ListenOptions;
use super::key::{format_key, location_of, namespace_prefix, storage_key, DEFAULT_NAMESPACE};
use crate::config::CacheConfig;
use crate::database::{DataSnapshot, DatabaseRef, EventKind, SnapshotHandler};
use crate::error::{CacheError, Result};
use crate::storage::StorageAdapter;

/// Caching layer in front of realtime-database listeners.
///
/// Subscribing first delivers the last value persisted for the location, then
/// attaches the live listener. Live values are staged in memory and written
/// to storage when the listener is detached.
pub struct CacheManager<S> {
    storage: Arc<S>,
    namespace: String,
    /// Latest serialized live value per storage key, awaiting unsubscribe.
    staged: Arc<Mutex<HashMap<String, String>>>,
}

impl<S: StorageAdapter> CacheManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_namespace(storage, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(storage: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
            staged: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(storage: Arc<S>, config: &CacheConfig) -> Self {
        Self::with_namespace(storage, config.namespace.clone())
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key_for<R: DatabaseRef + ?Sized>(&self, db_ref: &R, kind: EventKind) -> String {
        storage_key(&self.namespace, db_ref, kind)
    }

    /// Whether a live value is waiting to be flushed for this location.
    #[cfg(test)]
    fn is_staged<R: DatabaseRef + ?Sized>(&self, db_ref: &R) -> bool {
        self.staged
            .lock()
            .contains_key(&self.key_for(db_ref, EventKind::Value))
    }

    #[cfg(test)]
    fn staged_count(&self) -> usize {
        self.staged.lock().len()
    }

    // ===== Generic =====

    /// Listen for `kind` events. Only `Value` is cached; every other kind is
    /// passed straight through: each snapshot goes to `snap_callback` and its
    /// result to `processed_callback`.
    pub async fn on<R, C, T, F, P>(
        &self,
        db_ref: &R,
        kind: EventKind,
        snap_callback: F,
        processed_callback: P,
        options: ListenOptions<C>,
    ) -> Result<()>
    where
        R: DatabaseRef + ?Sized,
        C: Send + Sync + 'static,
        T: Serialize + DeserializeOwned + 'static,
        F: Fn(Option<&C>, &DataSnapshot) -> T + Send + 'static,
        P: Fn(Option<&C>, T) + Send + 'static,
    {
        if kind == EventKind::Value {
            return self
                .on_value(db_ref, snap_callback, processed_callback, options)
                .await;
        }

        let context = options.bound_context();
        let on_event: SnapshotHandler = Box::new(move |snapshot: DataSnapshot| {
            let processed = snap_callback(context.as_deref(), &snapshot);
            processed_callback(context.as_deref(), processed);
        });
        debug!(kind = %kind, url = %db_ref.to_url(), "Attaching uncached listener");
        db_ref.attach(kind, on_event, options.cancel_handler(self.key_for(db_ref, kind)));
        Ok(())
    }

    /// Detach listeners and persist the staged value, if any.
    pub async fn off<R: DatabaseRef + ?Sized>(&self, db_ref: &R) -> Result<()> {
        self.off_value(db_ref).await
    }

    // ===== Value =====

    /// Deliver the cached value for `db_ref` (if one exists) and then attach
    /// a live `value` listener.
    ///
    /// Each live snapshot is passed through `transform`; the result is staged
    /// for persistence and handed to `deliver`. Returns once the cache has
    /// been read and the listener attached.
    ///
    /// A cached record that does not parse as `T` fails the call with
    /// [`CacheError::Parse`] and no listener is attached.
    pub async fn on_value<R, C, T, F, D>(
        &self,
        db_ref: &R,
        transform: F,
        deliver: D,
        options: ListenOptions<C>,
    ) -> Result<()>
    where
        R: DatabaseRef + ?Sized,
        C: Send + Sync + 'static,
        T: Serialize + DeserializeOwned + 'static,
        F: Fn(Option<&C>, &DataSnapshot) -> T + Send + 'static,
        D: Fn(Option<&C>, T) + Send + 'static,
    {
        let key = self.key_for(db_ref, EventKind::Value);

        if let Some(cached) = self.read_record::<T>(&key).await? {
            debug!(key = %key, "Delivering cached value");
            options.call(|ctx, value| deliver(ctx, value), cached);
        }

        let context = options.bound_context();
        let staged = Arc::clone(&self.staged);
        let stage_key = key.clone();
        let on_event: SnapshotHandler = Box::new(move |snapshot: DataSnapshot| {
            let processed = transform(context.as_deref(), &snapshot);
            match serde_json::to_string(&processed) {
                Ok(serialized) => {
                    staged.lock().insert(stage_key.clone(), serialized);
                }
                Err(e) => warn!(key = %stage_key, error = %e, "Live value not staged"),
            }
            deliver(context.as_deref(), processed);
        });

        debug!(key = %key, "Attaching value listener");
        db_ref.attach(EventKind::Value, on_event, options.cancel_handler(key));
        Ok(())
    }

    /// Detach listeners at `db_ref` and write its staged value to storage.
    ///
    /// Nothing is written when no live value arrived. If the write fails the
    /// value stays staged so a later call can retry it.
    pub async fn off_value<R: DatabaseRef + ?Sized>(&self, db_ref: &R) -> Result<()> {
        let key = self.key_for(db_ref, EventKind::Value);
        db_ref.detach();

        let staged = self.staged.lock().remove(&key);
        let Some(value) = staged else {
            debug!(key = %key, "Detached with nothing staged");
            return Ok(());
        };

        if let Err(e) = self.storage.set_item(&key, &value).await {
            self.staged.lock().entry(key).or_insert(value);
            return Err(e.into());
        }
        debug!(key = %key, bytes = value.len(), "Flushed staged value");
        Ok(())
    }

    // ===== Child added =====

    /// Deliver the cached list for `db_ref` to `cached_callback` (if one
    /// exists) and then attach a live `child_added` listener.
    ///
    /// `data_available` runs once, just before the first live child reaches
    /// `snap_callback`. It never runs if no child arrives.
    pub async fn on_child_added<R, C, T, K, A, F>(
        &self,
        db_ref: &R,
        cached_callback: K,
        data_available: A,
        snap_callback: F,
        options: ListenOptions<C>,
    ) -> Result<()>
    where
        R: DatabaseRef + ?Sized,
        C: Send + Sync + 'static,
        T: DeserializeOwned,
        K: FnOnce(Option<&C>, T) + Send,
        A: Fn(Option<&C>) + Send + 'static,
        F: Fn(Option<&C>, DataSnapshot) + Send + 'static,
    {
        let key = self.key_for(db_ref, EventKind::ChildAdded);

        if let Some(cached) = self.read_record::<T>(&key).await? {
            debug!(key = %key, "Delivering cached list");
            options.call(cached_callback, cached);
        }

        let context = options.bound_context();
        let mut started = false;
        let on_event: SnapshotHandler = Box::new(move |snapshot: DataSnapshot| {
            if !started {
                started = true;
                data_available(context.as_deref());
            }
            snap_callback(context.as_deref(), snapshot);
        });

        debug!(key = %key, "Attaching child_added listener");
        db_ref.attach(EventKind::ChildAdded, on_event, options.cancel_handler(key));
        Ok(())
    }

    /// Detach listeners at `db_ref` and persist `list_to_cache` as the list
    /// the next `on_child_added` replays.
    pub async fn off_child_added<R, T>(&self, db_ref: &R, list_to_cache: &T) -> Result<()>
    where
        R: DatabaseRef + ?Sized,
        T: Serialize + ?Sized,
    {
        let key = self.key_for(db_ref, EventKind::ChildAdded);
        db_ref.detach();

        let serialized = serde_json::to_string(list_to_cache).map_err(|source| CacheError::Serialize {
            key: key.clone(),
            source,
        })?;
        self.storage.set_item(&key, &serialized).await?;
        debug!(key = %key, bytes = serialized.len(), "Persisted child list");
        Ok(())
    }

    // ===== Uncached child events =====

    pub async fn on_child_changed<R, C, F>(&self, db_ref: &R, callback: F, options: ListenOptions<C>) -> Result<()>
    where
        R: DatabaseRef + ?Sized,
        C: Send + Sync + 'static,
        F: Fn(Option<&C>, DataSnapshot) + Send + 'static,
    {
        self.attach_uncached(db_ref, EventKind::ChildChanged, callback, options);
        Ok(())
    }

    pub async fn on_child_removed<R, C, F>(&self, db_ref: &R, callback: F, options: ListenOptions<C>) -> Result<()>
    where
        R: DatabaseRef + ?Sized,
        C: Send + Sync + 'static,
        F: Fn(Option<&C>, DataSnapshot) + Send + 'static,
    {
        self.attach_uncached(db_ref, EventKind::ChildRemoved, callback, options);
        Ok(())
    }

    pub async fn on_child_moved<R, C, F>(&self, db_ref: &R, callback: F, options: ListenOptions<C>) -> Result<()>
    where
        R: DatabaseRef + ?Sized,
        C: Send + Sync + 'static,
        F: Fn(Option<&C>, DataSnapshot) + Send + 'static,
    {
        self.attach_uncached(db_ref, EventKind::ChildMoved, callback, options);
        Ok(())
    }

    fn attach_uncached<R, C, F>(&self, db_ref: &R, kind: EventKind, callback: F, options: ListenOptions<C>)
    where
        R: DatabaseRef + ?Sized,
        C: Send + Sync + 'static,
        F: Fn(Option<&C>, DataSnapshot) + Send + 'static,
    {
        let context = options.bound_context();
        let on_event: SnapshotHandler = Box::new(move |snapshot: DataSnapshot| {
            callback(context.as_deref(), snapshot);
        });
        debug!(kind = %kind, url = %db_ref.to_url(), "Attaching uncached listener");
        db_ref.attach(kind, on_event, options.cancel_handler(self.key_for(db_ref, kind)));
    }

    // ===== Maintenance =====

    /// Remove the persisted records for `db_ref` under every event kind.
    /// Live listeners and staged values are left alone.
    pub async fn clear_cache_for_ref<R: DatabaseRef + ?Sized>(&self, db_ref: &R) -> Result<()> {
        let location = location_of(db_ref);
        let keys: Vec<String> = EventKind::ALL
            .iter()
            .map(|kind| format_key(&self.namespace, *kind, &location))
            .collect();

        try_join_all(keys.iter().map(|key| self.storage.remove_item(key))).await?;
        info!(location = %location, "Cleared cached records for location");
        Ok(())
    }

    /// Remove every persisted record in this cache's namespace. Keys outside
    /// the namespace are untouched. Returns the number of keys removed.
    pub async fn clear_cache(&self) -> Result<usize> {
        let keys = self.cached_keys().await?;
        try_join_all(keys.iter().map(|key| self.storage.remove_item(key))).await?;
        info!(cleared = keys.len(), namespace = %self.namespace, "Cleared cache");
        Ok(keys.len())
    }

    /// Every persisted key in this cache's namespace.
    pub async fn cached_keys(&self) -> Result<Vec<String>> {
        let prefix = namespace_prefix(&self.namespace);
        let keys = self.storage.get_all_keys().await?;
        Ok(keys.into_iter().filter(|key| key.starts_with(&prefix)).collect())
    }

    async fn read_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.storage.get_item(key).await? else {
            debug!(key = %key, "No cached record");
            return Ok(None);
        };
        let value = serde_json::from_str(&raw).map_err(|source| CacheError::Parse {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }
}

// ============================================================================
// Tests
// ============================================================================
