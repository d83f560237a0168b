//! Storage-key derivation.
//!
//! A key has the form `<namespace>:<event kind>:<location>`, where the
//! location is the reference URL with the database root stripped.

use crate::database::{DatabaseRef, EventKind};

/// Namespace shared by every cache-owned key.
pub const DEFAULT_NAMESPACE: &str = "@FirebaseLocalCache";

/// Path of `db_ref` relative to its database root.
///
/// Direct references expose their root themselves; queries expose it through
/// their underlying reference. If neither is available nothing is stripped.
pub fn location_of<R: DatabaseRef + ?Sized>(db_ref: &R) -> String {
    let url = db_ref.to_url();
    let root = db_ref
        .root_url()
        .or_else(|| db_ref.ref_root_url())
        .unwrap_or_default();
    match url.strip_prefix(root.as_str()) {
        Some(location) => location.to_string(),
        // Root is not a prefix: mimic substring-by-length.
        None => url.get(root.len()..).unwrap_or_default().to_string(),
    }
}

pub fn storage_key<R: DatabaseRef + ?Sized>(namespace: &str, db_ref: &R, kind: EventKind) -> String {
    format_key(namespace, kind, &location_of(db_ref))
}

pub fn format_key(namespace: &str, kind: EventKind, location: &str) -> String {
    format!("{}:{}:{}", namespace, kind.as_str(), location)
}

/// Prefix every key in `namespace` starts with.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{}:", namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use crate::testing::StaticRef;
    use proptest::prelude::*;

    #[test]
    fn test_key_for_direct_reference() {
        let db = MemoryDatabase::with_root_url("https://fake.firebase.com/");
        let reference = db.reference("my/db/ref");
        assert_eq!(
            storage_key(DEFAULT_NAMESPACE, &reference, EventKind::Value),
            "@FirebaseLocalCache:value:my/db/ref"
        );
    }

    #[test]
    fn test_key_for_query_uses_underlying_root() {
        let db = MemoryDatabase::with_root_url("https://fake.firebase.com/");
        let query = db.reference("messages").limit_to_last(10);
        assert_eq!(
            storage_key(DEFAULT_NAMESPACE, &query, EventKind::ChildAdded),
            "@FirebaseLocalCache:child_added:messages"
        );
    }

    #[test]
    fn test_key_without_root_keeps_full_url() {
        let rootless = StaticRef::rootless("https://fake.firebase.com/a/b");
        assert_eq!(
            storage_key(DEFAULT_NAMESPACE, &rootless, EventKind::Value),
            "@FirebaseLocalCache:value:https://fake.firebase.com/a/b"
        );
    }

    #[test]
    fn test_namespace_prefix() {
        assert_eq!(namespace_prefix(DEFAULT_NAMESPACE), "@FirebaseLocalCache:");
    }

    fn location_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z0-9_-]{1,8}", 0..5).prop_map(|segments| segments.join("/"))
    }

    fn kind_strategy() -> impl Strategy<Value = EventKind> {
        prop::sample::select(EventKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_key_is_deterministic(location in location_strategy(), kind in kind_strategy()) {
            let db = MemoryDatabase::new();
            let a = storage_key(DEFAULT_NAMESPACE, &db.reference(&location), kind);
            let b = storage_key(DEFAULT_NAMESPACE, &db.reference(&location), kind);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_distinct_pairs_never_collide(
            loc_a in location_strategy(),
            loc_b in location_strategy(),
            kind_a in kind_strategy(),
            kind_b in kind_strategy(),
        ) {
            prop_assume!(loc_a != loc_b || kind_a != kind_b);
            let db = MemoryDatabase::new();
            let a = storage_key(DEFAULT_NAMESPACE, &db.reference(&loc_a), kind_a);
            let b = storage_key(DEFAULT_NAMESPACE, &db.reference(&loc_b), kind_b);
            prop_assert_ne!(a, b);
        }
    }
}
