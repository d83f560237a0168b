//! Demo screens driven by the cache.
//!
//! Each screen subscribes through the `CacheManager`, prints whatever it is
//! handed (tagged cached or live), then unsubscribes so the latest data is
//! persisted for the next run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use firecache_core::{
    CacheConfig, CacheManager, DataSnapshot, FileStorage, ListenOptions, MemoryDatabase,
};
use parking_lot::Mutex;
use serde_json::json;
use tracing::info;

use crate::models::{Item, ItemSummary, Message};
use crate::seed;

/// Number of messages kept for the next run by default.
pub const DEFAULT_KEEP: usize = 2;

/// State shared by a value screen's callbacks.
#[derive(Default)]
struct ValueScreen {
    /// Set once the first live snapshot is transformed.
    live: AtomicBool,
}

impl ValueScreen {
    fn tag(&self) -> &'static str {
        if self.live.load(Ordering::SeqCst) {
            "live"
        } else {
            "cached"
        }
    }
}

/// State shared by the message list's callbacks.
#[derive(Default)]
struct MessageScreen {
    messages: Mutex<Vec<Message>>,
}

pub struct Demo {
    cache: CacheManager<FileStorage>,
    db: MemoryDatabase,
}

impl Demo {
    pub fn new(config: &CacheConfig, offline: bool) -> Result<Self> {
        let cache_dir = config.cache_dir().context("Failed to resolve cache directory")?;
        info!(cache_dir = %cache_dir.display(), offline, "Opening demo");

        let db = MemoryDatabase::new();
        seed::seed(&db);
        if offline {
            db.go_offline();
        }

        Ok(Self {
            cache: CacheManager::from_config(Arc::new(FileStorage::new(cache_dir)), config),
            db,
        })
    }

    /// Item list for `user`, cached as a whole value.
    pub async fn show_items(&self, user: &str) -> Result<()> {
        let reference = self.db.reference(&format!("user-items/{}", user));
        let screen = Arc::new(ValueScreen::default());

        println!("Items for {}:", user);
        self.cache
            .on_value(
                &reference,
                |screen: Option<&ValueScreen>, snap: &DataSnapshot| {
                    if let Some(screen) = screen {
                        screen.live.store(true, Ordering::SeqCst);
                    }
                    ItemSummary::list_from_snapshot(snap)
                },
                |screen: Option<&ValueScreen>, items: Vec<ItemSummary>| {
                    let tag = screen.map(|s| s.tag()).unwrap_or("live");
                    println!("  [{}] {} item(s)", tag, items.len());
                    for item in items {
                        println!("    {} ({})", item.name, item.key);
                    }
                },
                ListenOptions::with_context(screen),
            )
            .await
            .context("Failed to subscribe to item list")?;

        self.cache
            .off_value(&reference)
            .await
            .context("Failed to persist item list")?;
        Ok(())
    }

    /// A single item, cached as a whole value.
    pub async fn show_item(&self, id: &str) -> Result<()> {
        let reference = self.db.reference("items").child(id);
        let screen = Arc::new(ValueScreen::default());

        println!("Item {}:", id);
        self.cache
            .on_value(
                &reference,
                |screen: Option<&ValueScreen>, snap: &DataSnapshot| {
                    if let Some(screen) = screen {
                        screen.live.store(true, Ordering::SeqCst);
                    }
                    Item::from_snapshot(snap)
                },
                |screen: Option<&ValueScreen>, item: Option<Item>| {
                    let tag = screen.map(|s| s.tag()).unwrap_or("live");
                    match item {
                        Some(item) => println!("  [{}] {}: {}", tag, item.name, item.description),
                        None => println!("  [{}] (no such item)", tag),
                    }
                },
                ListenOptions::<ValueScreen>::new()
                    .on_cancel(|_, err| eprintln!("  listener cancelled: {}", err))
                    .bind(screen),
            )
            .await
            .context("Failed to subscribe to item")?;

        self.cache
            .off_value(&reference)
            .await
            .context("Failed to persist item")?;
        Ok(())
    }

    /// Message list, cached as the first `keep` messages.
    pub async fn show_messages(&self, keep: usize) -> Result<()> {
        let reference = self.db.reference("messages");
        let screen = Arc::new(MessageScreen::default());

        println!("Messages:");
        self.cache
            .on_child_added(
                &reference,
                |screen: Option<&MessageScreen>, cached: Vec<Message>| {
                    for message in &cached {
                        println!("  [cached] {}", message.message);
                    }
                    if let Some(screen) = screen {
                        *screen.messages.lock() = cached;
                    }
                },
                |screen: Option<&MessageScreen>| {
                    println!("  -- live data available --");
                    if let Some(screen) = screen {
                        screen.messages.lock().clear();
                    }
                },
                |screen: Option<&MessageScreen>, snap: DataSnapshot| {
                    let message = Message::from_snapshot(&snap);
                    println!("  [live] {}", message.message);
                    if let Some(screen) = screen {
                        screen.messages.lock().push(message);
                    }
                },
                ListenOptions::with_context(Arc::clone(&screen)),
            )
            .await
            .context("Failed to subscribe to messages")?;

        // Another client posting while we listen.
        if self.db.is_online() {
            reference.push(json!({ "message": "Running late, save me a seat" }));
        }

        let to_keep: Vec<Message> = screen.messages.lock().iter().take(keep).cloned().collect();
        self.cache
            .off_child_added(&reference, &to_keep)
            .await
            .context("Failed to persist messages")?;
        info!(kept = to_keep.len(), "Persisted messages");
        Ok(())
    }

    pub async fn clear(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                self.cache
                    .clear_cache_for_ref(&self.db.reference(path))
                    .await
                    .context("Failed to clear cache for location")?;
                println!("Cleared cached records for /{}", path);
            }
            None => {
                let cleared = self.cache.clear_cache().await.context("Failed to clear cache")?;
                println!("Cleared {} cached record(s)", cleared);
            }
        }
        Ok(())
    }

    pub async fn list_keys(&self) -> Result<()> {
        let keys = self.cache.cached_keys().await.context("Failed to list cache keys")?;
        if keys.is_empty() {
            println!("Cache is empty");
        }
        for key in keys {
            println!("{}", key);
        }
        Ok(())
    }
}
