use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A single event reconstructed from a text log.
///
/// Fields keep the order in which they appeared in the log. Inserting a key
/// that is already present replaces its value in place (the key keeps its
/// original position).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    fields: Map<String, Value>,
}

impl EventRecord {
    pub fn new() -> Self {
        EventRecord { fields: Map::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), Value::String(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EventRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = EventRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keeps_insertion_order() {
        let record: EventRecord = [("b", "1"), ("a", "2"), ("c", "3")].into_iter().collect();

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_repeated_key_overwrites_in_place() {
        let mut record = EventRecord::new();
        record.insert("Source", "first");
        record.insert("Type", "Error");
        record.insert("Source", "second");

        assert_eq!(record.len(), 2);
        assert_eq!(
            record.iter().collect::<Vec<_>>(),
            vec![("Source", "second"), ("Type", "Error")]
        );
    }

    #[test]
    fn test_json_views_match_fields() {
        let record: EventRecord = [("Event number", "4"), ("Number of strings", "0")]
            .into_iter()
            .collect();

        assert_eq!(
            record.as_json().get("Event number"),
            Some(&Value::String("4".to_owned()))
        );
        assert_eq!(
            record.into_json(),
            serde_json::json!({"Event number": "4", "Number of strings": "0"})
        );
    }
}
