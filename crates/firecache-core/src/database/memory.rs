//! In-process realtime database.
//!
//! Holds a JSON tree and dispatches listener events with realtime-database
//! semantics. Every listener remembers the data it last observed; after a
//! write (or when going back online) each listener is diffed against the
//! current tree and receives only the events that describe the difference.
//! While offline nothing is dispatched, so a listener attached offline gets
//! its initial events when the database comes back online.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::debug;

use super::{CancelHandler, DataSnapshot, DatabaseRef, EventKind, SnapshotHandler};
use crate::error::DatabaseError;

/// Root URL used when none is supplied.
pub const DEFAULT_ROOT_URL: &str = "https://local.firecache/";

static NULL: Value = Value::Null;

/// Alphabet for push keys, in ASCII order so keys sort chronologically.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLimit {
    First(usize),
    Last(usize),
}

impl QueryLimit {
    fn apply(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                let kept: Vec<(String, Value)> = match *self {
                    QueryLimit::First(n) => entries.into_iter().take(n).collect(),
                    QueryLimit::Last(n) => {
                        let skip = entries.len().saturating_sub(n);
                        entries.into_iter().skip(skip).collect()
                    }
                };
                if kept.is_empty() {
                    Value::Null
                } else {
                    Value::Object(kept.into_iter().collect())
                }
            }
            other => other,
        }
    }
}

type SharedHandler = Arc<Mutex<SnapshotHandler>>;
type Event = (SharedHandler, DataSnapshot);

struct Listener {
    path: String,
    kind: EventKind,
    limit: Option<QueryLimit>,
    handler: SharedHandler,
    cancel: Option<CancelHandler>,
    /// Data at `path` as of the last dispatch; `None` until first synced.
    seen: Option<Value>,
}

struct Inner {
    root_url: String,
    data: Value,
    listeners: Vec<Listener>,
    denied: Vec<String>,
    online: bool,
    last_push: Option<(i64, [u8; 12])>,
    /// Events waiting for the active dispatch loop.
    pending: VecDeque<Event>,
    dispatching: bool,
}

impl Inner {
    fn is_denied(&self, path: &str) -> bool {
        self.denied.iter().any(|rule| is_within(path, rule))
    }

    /// Bring every listener up to date with the current tree and return the
    /// events to deliver. Returns nothing while offline.
    fn sync_listeners(&mut self) -> Vec<Event> {
        if !self.online {
            return Vec::new();
        }

        let mut events = Vec::new();
        for listener in self.listeners.iter_mut() {
            let mut current = value_at(&self.data, &listener.path).clone();
            if let Some(limit) = listener.limit {
                current = limit.apply(current);
            }
            let key = last_segment(&listener.path);

            match listener.kind {
                EventKind::Value => {
                    if listener.seen.as_ref() != Some(&current) {
                        events.push((
                            Arc::clone(&listener.handler),
                            DataSnapshot::new(key, current.clone()),
                        ));
                    }
                }
                EventKind::ChildAdded | EventKind::ChildChanged | EventKind::ChildRemoved => {
                    let empty = Map::new();
                    let before = listener
                        .seen
                        .as_ref()
                        .and_then(|v| v.as_object())
                        .unwrap_or(&empty);
                    let after = current.as_object().unwrap_or(&empty);
                    for snapshot in child_events(listener.kind, before, after) {
                        events.push((Arc::clone(&listener.handler), snapshot));
                    }
                }
                // Children are ordered by key only, so they never move.
                EventKind::ChildMoved => {}
            }
            listener.seen = Some(current);
        }
        events
    }

    fn next_push_key(&mut self) -> String {
        let now = Utc::now().timestamp_millis();
        let random = match self.last_push {
            Some((last, mut chars)) if last == now => {
                // Same millisecond: increment so keys stay strictly ordered.
                for c in chars.iter_mut().rev() {
                    if *c == 63 {
                        *c = 0;
                    } else {
                        *c += 1;
                        break;
                    }
                }
                chars
            }
            _ => {
                let mut rng = rand::thread_rng();
                let mut chars = [0u8; 12];
                for c in chars.iter_mut() {
                    *c = rng.gen_range(0..64);
                }
                chars
            }
        };
        self.last_push = Some((now, random));

        let mut key = String::with_capacity(20);
        let mut ts = now;
        let mut prefix = [0u8; 8];
        for slot in prefix.iter_mut().rev() {
            *slot = PUSH_CHARS[(ts % 64) as usize];
            ts /= 64;
        }
        key.extend(prefix.iter().map(|&b| b as char));
        key.extend(random.iter().map(|&i| PUSH_CHARS[i as usize] as char));
        key
    }
}

fn child_events(kind: EventKind, before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<DataSnapshot> {
    let mut keys: Vec<&String> = match kind {
        EventKind::ChildRemoved => before.keys().filter(|k| !after.contains_key(*k)).collect(),
        EventKind::ChildAdded => after.keys().filter(|k| !before.contains_key(*k)).collect(),
        EventKind::ChildChanged => after
            .iter()
            .filter(|(k, v)| before.get(*k).map(|old| old != *v).unwrap_or(false))
            .map(|(k, _)| k)
            .collect(),
        _ => Vec::new(),
    };
    keys.sort();

    let source = if kind == EventKind::ChildRemoved { before } else { after };
    keys.into_iter()
        .map(|k| DataSnapshot::new(Some(k.clone()), source[k].clone()))
        .collect()
}

/// Normalize a `/`-separated path: no leading, trailing or doubled slashes.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn last_segment(path: &str) -> Option<String> {
    path.rsplit('/').next().filter(|s| !s.is_empty()).map(str::to_string)
}

fn is_within(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || (path.starts_with(ancestor) && path[ancestor.len()..].starts_with('/'))
}

fn value_at<'a>(root: &'a Value, path: &str) -> &'a Value {
    let mut current = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &NULL,
        }
    }
    current
}

/// Write `value` at `segments`, creating intermediate objects. Writing null
/// removes the node and prunes parents left empty.
fn write_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else { return };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(*first);
        } else {
            map.insert((*first).to_string(), value);
        }
    } else {
        let child = map.entry((*first).to_string()).or_insert(Value::Null);
        write_at(child, rest, value);
        if child.is_null() || child.as_object().map(|m| m.is_empty()).unwrap_or(false) {
            map.remove(*first);
        }
    }

    if map.is_empty() {
        *node = Value::Null;
    }
}

/// Shared handle to an in-process database. Clones refer to the same data.
#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::with_root_url(DEFAULT_ROOT_URL)
    }

    pub fn with_root_url(root_url: &str) -> Self {
        let mut root_url = root_url.to_string();
        if !root_url.ends_with('/') {
            root_url.push('/');
        }
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root_url,
                data: Value::Null,
                listeners: Vec::new(),
                denied: Vec::new(),
                online: true,
                last_push: None,
                pending: VecDeque::new(),
                dispatching: false,
            })),
        }
    }

    pub fn root_url(&self) -> String {
        self.inner.lock().root_url.clone()
    }

    pub fn reference(&self, path: &str) -> MemoryRef {
        MemoryRef {
            db: self.clone(),
            path: normalize_path(path),
        }
    }

    pub fn get(&self, path: &str) -> Value {
        let inner = self.inner.lock();
        value_at(&inner.data, &normalize_path(path)).clone()
    }

    pub fn set(&self, path: &str, value: Value) {
        let path = normalize_path(path);
        let events = {
            let mut inner = self.inner.lock();
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            write_at(&mut inner.data, &segments, value);
            inner.sync_listeners()
        };
        debug!(path = %path, events = events.len(), "Database write");
        self.dispatch(events);
    }

    /// Set several children of `path` in one write.
    pub fn update(&self, path: &str, children: Map<String, Value>) {
        let path = normalize_path(path);
        let events = {
            let mut inner = self.inner.lock();
            for (child, value) in children {
                let full = normalize_path(&format!("{}/{}", path, child));
                let segments: Vec<&str> = full.split('/').filter(|s| !s.is_empty()).collect();
                write_at(&mut inner.data, &segments, value);
            }
            inner.sync_listeners()
        };
        self.dispatch(events);
    }

    /// Append `value` under a generated, chronologically ordered key.
    pub fn push(&self, path: &str, value: Value) -> String {
        let key = self.inner.lock().next_push_key();
        self.set(&format!("{}/{}", normalize_path(path), key), value);
        key
    }

    pub fn remove(&self, path: &str) {
        self.set(path, Value::Null);
    }

    /// Deny reads at and below `path`. Listeners already attached there are
    /// cancelled with `permission_denied`.
    pub fn deny_read(&self, path: &str) {
        let rule = normalize_path(path);
        let cancelled: Vec<(String, Option<CancelHandler>)> = {
            let mut inner = self.inner.lock();
            inner.denied.push(rule.clone());
            let (denied, kept): (Vec<Listener>, Vec<Listener>) = inner
                .listeners
                .drain(..)
                .partition(|l| is_within(&l.path, &rule));
            inner.listeners = kept;
            denied.into_iter().map(|l| (l.path, l.cancel)).collect()
        };
        for (path, cancel) in cancelled {
            if let Some(cancel) = cancel {
                cancel(DatabaseError::permission_denied(&path));
            }
        }
    }

    pub fn allow_read(&self, path: &str) {
        let rule = normalize_path(path);
        self.inner.lock().denied.retain(|r| *r != rule);
    }

    pub fn go_offline(&self) {
        self.inner.lock().online = false;
    }

    /// Reconnect and deliver everything listeners missed while offline.
    pub fn go_online(&self) {
        let events = {
            let mut inner = self.inner.lock();
            inner.online = true;
            inner.sync_listeners()
        };
        self.dispatch(events);
    }

    pub fn is_online(&self) -> bool {
        self.inner.lock().online
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    fn attach(
        &self,
        path: &str,
        kind: EventKind,
        limit: Option<QueryLimit>,
        on_event: SnapshotHandler,
        on_cancel: Option<CancelHandler>,
    ) {
        let events = {
            let mut inner = self.inner.lock();
            if inner.is_denied(path) {
                drop(inner);
                debug!(path = %path, kind = %kind, "Listener denied");
                if let Some(cancel) = on_cancel {
                    cancel(DatabaseError::permission_denied(path));
                }
                return;
            }
            inner.listeners.push(Listener {
                path: path.to_string(),
                kind,
                limit,
                handler: Arc::new(Mutex::new(on_event)),
                cancel: on_cancel,
                seen: None,
            });
            inner.sync_listeners()
        };
        self.dispatch(events);
    }

    fn detach(&self, path: &str) {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|l| l.path != path);
    }

    /// Deliver `events` in order with the database unlocked, so handlers may
    /// read and write it. Events raised while a handler runs are queued and
    /// delivered by the outermost dispatch once that handler returns.
    fn dispatch(&self, events: Vec<Event>) {
        {
            let mut inner = self.inner.lock();
            inner.pending.extend(events);
            if inner.dispatching {
                return;
            }
            inner.dispatching = true;
        }

        loop {
            let next = {
                let mut inner = self.inner.lock();
                match inner.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        inner.dispatching = false;
                        return;
                    }
                }
            };
            let (handler, snapshot) = next;
            let mut guard = handler.lock();
            let handler = &mut *guard;
            handler(snapshot);
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// A location in a [`MemoryDatabase`].
#[derive(Clone)]
pub struct MemoryRef {
    db: MemoryDatabase,
    path: String,
}

impl MemoryRef {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn key(&self) -> Option<String> {
        last_segment(&self.path)
    }

    pub fn child(&self, path: &str) -> MemoryRef {
        self.db.reference(&format!("{}/{}", self.path, path))
    }

    pub fn parent(&self) -> Option<MemoryRef> {
        if self.path.is_empty() {
            return None;
        }
        let parent = self.path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        Some(self.db.reference(parent))
    }

    pub fn get(&self) -> Value {
        self.db.get(&self.path)
    }

    pub fn set(&self, value: Value) {
        self.db.set(&self.path, value);
    }

    pub fn update(&self, children: Map<String, Value>) {
        self.db.update(&self.path, children);
    }

    pub fn push(&self, value: Value) -> MemoryRef {
        let key = self.db.push(&self.path, value);
        self.child(&key)
    }

    pub fn remove(&self) {
        self.db.remove(&self.path);
    }

    pub fn limit_to_first(&self, n: usize) -> MemoryQuery {
        MemoryQuery {
            reference: self.clone(),
            limit: QueryLimit::First(n),
        }
    }

    pub fn limit_to_last(&self, n: usize) -> MemoryQuery {
        MemoryQuery {
            reference: self.clone(),
            limit: QueryLimit::Last(n),
        }
    }
}

impl DatabaseRef for MemoryRef {
    fn to_url(&self) -> String {
        format!("{}{}", self.db.root_url(), self.path)
    }

    fn root_url(&self) -> Option<String> {
        Some(self.db.root_url())
    }

    fn attach(&self, kind: EventKind, on_event: SnapshotHandler, on_cancel: Option<CancelHandler>) {
        self.db.attach(&self.path, kind, None, on_event, on_cancel);
    }

    fn detach(&self) {
        self.db.detach(&self.path);
    }
}

/// A limited view over a [`MemoryRef`]. Exposes its root only through the
/// underlying reference.
#[derive(Clone)]
pub struct MemoryQuery {
    reference: MemoryRef,
    limit: QueryLimit,
}

impl MemoryQuery {
    pub fn reference(&self) -> &MemoryRef {
        &self.reference
    }

    pub fn limit(&self) -> QueryLimit {
        self.limit
    }
}

impl DatabaseRef for MemoryQuery {
    fn to_url(&self) -> String {
        self.reference.to_url()
    }

    fn root_url(&self) -> Option<String> {
        None
    }

    fn ref_root_url(&self) -> Option<String> {
        self.reference.root_url()
    }

    fn attach(&self, kind: EventKind, on_event: SnapshotHandler, on_cancel: Option<CancelHandler>) {
        self.reference
            .db
            .attach(&self.reference.path, kind, Some(self.limit), on_event, on_cancel);
    }

    fn detach(&self) {
        self.reference.detach();
    }
}
