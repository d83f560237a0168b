//! Records shown by the demo screens.
//!
//! These are the processed, JSON-serializable forms the cache persists,
//! built from raw database snapshots.

use firecache_core::DataSnapshot;
use serde::{Deserialize, Serialize};

/// Entry in a user's item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub name: String,
    #[serde(rename = "_key")]
    pub key: String,
}

impl ItemSummary {
    pub fn list_from_snapshot(snapshot: &DataSnapshot) -> Vec<ItemSummary> {
        snapshot
            .children()
            .iter()
            .map(|child| ItemSummary {
                name: text(child, "name"),
                key: child.key().unwrap_or_default().to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub description: String,
}

impl Item {
    pub fn from_snapshot(snapshot: &DataSnapshot) -> Option<Item> {
        if !snapshot.exists() {
            return None;
        }
        Some(Item {
            name: text(snapshot, "name"),
            description: text(snapshot, "description"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
    #[serde(rename = "_key")]
    pub key: String,
}

impl Message {
    pub fn from_snapshot(snapshot: &DataSnapshot) -> Message {
        Message {
            message: text(snapshot, "message"),
            key: snapshot.key().unwrap_or_default().to_string(),
        }
    }
}

fn text(snapshot: &DataSnapshot, field: &str) -> String {
    snapshot
        .child(field)
        .val()
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_list_from_snapshot() {
        let snap = DataSnapshot::new(
            Some("user1".to_string()),
            json!({"item2": {"name": "Desk"}, "item1": {"name": "Lamp"}}),
        );
        let items = ItemSummary::list_from_snapshot(&snap);
        assert_eq!(
            items,
            vec![
                ItemSummary { name: "Lamp".to_string(), key: "item1".to_string() },
                ItemSummary { name: "Desk".to_string(), key: "item2".to_string() },
            ]
        );
    }

    #[test]
    fn test_item_summary_serializes_key_field() {
        let item = ItemSummary { name: "Lamp".to_string(), key: "item1".to_string() };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"name": "Lamp", "_key": "item1"})
        );
    }

    #[test]
    fn test_missing_item() {
        let snap = DataSnapshot::new(Some("gone".to_string()), serde_json::Value::Null);
        assert!(Item::from_snapshot(&snap).is_none());
    }

    #[test]
    fn test_message_from_snapshot() {
        let snap = DataSnapshot::new(Some("-Nabc".to_string()), json!({"message": "hello"}));
        assert_eq!(
            Message::from_snapshot(&snap),
            Message { message: "hello".to_string(), key: "-Nabc".to_string() }
        );
    }
}
