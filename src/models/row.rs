//! Ordered table row.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Suffix for the companion key holding a cell's anchor href.
pub const LINK_SUFFIX: &str = "_link";

/// A table row: column name → cell text, in column order.
///
/// Serialized as a JSON object. Key order is preserved in both directions
/// so the CSV projection can fall back to the first row's keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<(String, String)>);

impl Row {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.insert(k, v);
        }
        row
    }

    /// Set a cell, replacing any existing value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Keys that are real columns (not `<col>_link` companions).
    pub fn column_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().filter(|k| !k.ends_with(LINK_SUFFIX))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column name to cell text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((k, v)) = access.next_entry::<String, serde_json::Value>()? {
                    let text = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    row.insert(k, text);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order_survives_json() {
        let row = Row::from_pairs([("Zeta", "1"), ("Alpha", "2"), ("Zeta_link", "https://x")]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Zeta":"1","Alpha":"2","Zeta_link":"https://x"}"#);

        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["Zeta", "Alpha", "Zeta_link"]);
        assert_eq!(back.column_keys().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_insert_replaces() {
        let mut row = Row::new();
        row.insert("a", "1");
        row.insert("a", "2");
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("a"), Some("2"));
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let row: Row = serde_json::from_str(r#"{"n": 12, "x": null}"#).unwrap();
        assert_eq!(row.get("n"), Some("12"));
        assert_eq!(row.get("x"), Some(""));
    }
}
