//! Test doubles for the remote database.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::database::{CancelHandler, DataSnapshot, DatabaseRef, EventKind, SnapshotHandler};
use crate::error::DatabaseError;

pub const FAKE_ROOT: &str = "https://fake.firebase.com/";

enum Behavior {
    /// Deliver these values synchronously on attach.
    Emit(Vec<Value>),
    Silent,
    Deny,
}

/// A reference with fixed behavior on attach that counts detaches.
pub struct StaticRef {
    url: String,
    root: Option<String>,
    behavior: Behavior,
    attached: Mutex<Vec<EventKind>>,
    detaches: AtomicUsize,
}

impl StaticRef {
    fn new(url: String, root: Option<String>, behavior: Behavior) -> Self {
        Self {
            url,
            root,
            behavior,
            attached: Mutex::new(Vec::new()),
            detaches: AtomicUsize::new(0),
        }
    }

    pub fn emitting(path: &str, values: Vec<Value>) -> Self {
        Self::new(format!("{}{}", FAKE_ROOT, path), Some(FAKE_ROOT.to_string()), Behavior::Emit(values))
    }

    pub fn silent(path: &str) -> Self {
        Self::new(format!("{}{}", FAKE_ROOT, path), Some(FAKE_ROOT.to_string()), Behavior::Silent)
    }

    pub fn forbidden(path: &str) -> Self {
        Self::new(format!("{}{}", FAKE_ROOT, path), Some(FAKE_ROOT.to_string()), Behavior::Deny)
    }

    pub fn rootless(url: &str) -> Self {
        Self::new(url.to_string(), None, Behavior::Silent)
    }

    pub fn attached(&self) -> Vec<EventKind> {
        self.attached.lock().clone()
    }

    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }
}

impl DatabaseRef for StaticRef {
    fn to_url(&self) -> String {
        self.url.clone()
    }

    fn root_url(&self) -> Option<String> {
        self.root.clone()
    }

    fn attach(&self, kind: EventKind, mut on_event: SnapshotHandler, on_cancel: Option<CancelHandler>) {
        self.attached.lock().push(kind);
        match &self.behavior {
            Behavior::Emit(values) => {
                let key = self.url.rsplit('/').next().map(str::to_string);
                for value in values {
                    on_event(DataSnapshot::new(key.clone(), value.clone()));
                }
            }
            Behavior::Silent => {}
            Behavior::Deny => {
                if let Some(cancel) = on_cancel {
                    cancel(DatabaseError::new("permission_denied", "error"));
                }
            }
        }
    }

    fn detach(&self) {
        self.detaches.fetch_add(1, Ordering::SeqCst);
    }
}
