//! Remote realtime-database seam.
//!
//! The cache never talks to a network itself. It consumes anything that
//! implements [`DatabaseRef`]: a location that can report its own URL and the
//! URL of its root, and that can attach and detach event listeners.
//!
//! - `EventKind`: the closed set of listener event kinds
//! - `DataSnapshot`: the payload handed to listeners
//! - `MemoryDatabase`: an in-process implementation used by tests and the demo

pub mod memory;
pub mod snapshot;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

pub use memory::{MemoryDatabase, MemoryQuery, MemoryRef};
pub use snapshot::DataSnapshot;

/// Invoked for every event delivered to an attached listener.
pub type SnapshotHandler = Box<dyn FnMut(DataSnapshot) + Send>;

/// Invoked at most once if the remote cancels the listener.
pub type CancelHandler = Box<dyn FnOnce(DatabaseError) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Value,
    ChildAdded,
    ChildChanged,
    ChildRemoved,
    ChildMoved,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Value,
        EventKind::ChildAdded,
        EventKind::ChildChanged,
        EventKind::ChildRemoved,
        EventKind::ChildMoved,
    ];

    /// Name used on the wire and inside storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Value => "value",
            EventKind::ChildAdded => "child_added",
            EventKind::ChildChanged => "child_changed",
            EventKind::ChildRemoved => "child_removed",
            EventKind::ChildMoved => "child_moved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown event kind: {}", s))
    }
}

/// A location (or a query over one) in a remote realtime database.
///
/// Implementations report the root either directly through [`root_url`] or,
/// for derived queries, through [`ref_root_url`] (the root of the underlying
/// reference). A location that reports neither yields a storage key that
/// still contains the full URL.
///
/// [`root_url`]: DatabaseRef::root_url
/// [`ref_root_url`]: DatabaseRef::ref_root_url
pub trait DatabaseRef: Send + Sync {
    /// Absolute URL of this location.
    fn to_url(&self) -> String;

    /// URL of the database root, for direct references.
    fn root_url(&self) -> Option<String>;

    /// URL of the root of the underlying reference, for queries.
    fn ref_root_url(&self) -> Option<String> {
        None
    }

    /// Attach a listener for `kind` events at this location.
    fn attach(&self, kind: EventKind, on_event: SnapshotHandler, on_cancel: Option<CancelHandler>);

    /// Detach every listener attached at this location.
    fn detach(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names() {
        let names: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["value", "child_added", "child_changed", "child_removed", "child_moved"]
        );
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!("child_moved".parse::<EventKind>(), Ok(EventKind::ChildMoved));
        assert!("child_dropped".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_kind_serde_matches_wire_name() {
        let json = serde_json::to_string(&EventKind::ChildAdded).unwrap();
        assert_eq!(json, "\"child_added\"");
    }
}
