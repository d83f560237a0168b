//! Listener caching.
//!
//! This module provides the `CacheManager`, which sits between consumers and
//! realtime-database listeners. It surfaces the last persisted value for a
//! location while the live listener is being established, stages live values
//! in memory, and persists them when the listener is detached.
//!
//! Records are stored as JSON under keys of the form
//! `<namespace>:<event kind>:<location>`. Cached listener kinds:
//! - `value`: the latest processed value, staged automatically
//! - `child_added`: a consumer-chosen list of children, persisted on detach

pub mod context;
pub mod key;
pub mod manager;

pub use context::{call_with_context, resolve_context, CancelCallback, CancelOrContext, ListenOptions};
pub use key::{location_of, storage_key, DEFAULT_NAMESPACE};
pub use manager::CacheManager;
