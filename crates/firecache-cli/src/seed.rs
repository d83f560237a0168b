//! Sample data for the demo database.

use firecache_core::MemoryDatabase;
use serde_json::json;

pub const DEFAULT_USER: &str = "user1";

pub fn seed(db: &MemoryDatabase) {
    db.set(
        "items",
        json!({
            "item1": {"name": "Camp stove", "description": "Two-burner propane stove"},
            "item2": {"name": "Lantern", "description": "Battery LED lantern"},
            "item3": {"name": "Tarp", "description": "10x12 ft ripstop tarp"},
        }),
    );
    db.set(
        &format!("user-items/{}", DEFAULT_USER),
        json!({
            "item1": {"name": "Camp stove"},
            "item2": {"name": "Lantern"},
            "item3": {"name": "Tarp"},
        }),
    );

    let messages = db.reference("messages");
    for text in ["Welcome to the channel", "Packing list is up", "Meet at 7am"] {
        messages.push(json!({ "message": text }));
    }
}
