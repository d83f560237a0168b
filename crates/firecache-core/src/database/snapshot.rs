use serde::de::DeserializeOwned;
use serde_json::Value;

static NULL: Value = Value::Null;

/// Immutable copy of the data at a location at the time of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSnapshot {
    key: Option<String>,
    value: Value,
}

impl DataSnapshot {
    pub fn new(key: Option<String>, value: Value) -> Self {
        Self { key, value }
    }

    /// Last path segment of the location, `None` at the root.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn val(&self) -> &Value {
        &self.value
    }

    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// Deserialize the snapshot value into `T`.
    pub fn val_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }

    /// Snapshot of a descendant, addressed by a `/`-separated relative path.
    pub fn child(&self, path: &str) -> DataSnapshot {
        let mut key = self.key.clone();
        let mut current = &self.value;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.get(segment).unwrap_or(&NULL);
            key = Some(segment.to_string());
        }
        DataSnapshot::new(key, current.clone())
    }

    /// Direct children in key order. Empty for leaves and null.
    pub fn children(&self) -> Vec<DataSnapshot> {
        match &self.value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                entries
                    .into_iter()
                    .map(|(k, v)| DataSnapshot::new(Some(k.clone()), v.clone()))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn num_children(&self) -> usize {
        self.value.as_object().map(|m| m.len()).unwrap_or(0)
    }
}
