//! Decode shapes for vendor payload quirks.
//!
//! The practice-management vendor in particular answers the same
//! endpoint with a bare object one day and a one-element array the
//! next, and flips ids between JSON numbers and strings. These types
//! absorb both so the typed clients never branch on shape.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A value that may arrive as a single item or an array of items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    /// First item, in arrival order. `None` for an empty array.
    pub fn into_first(self) -> Option<T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(items) => items.into_iter().next(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(items) => items.is_empty(),
        }
    }
}

/// A vendor identifier normalized to a string no matter how it arrived.
///
/// Comparison and storage always use the string form, so `123` and
/// `"123"` are the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OpaqueId(String);

impl OpaqueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OpaqueId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OpaqueId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for OpaqueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(serde_json::Number),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => OpaqueId(s),
            Repr::Number(n) => OpaqueId(n.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Reserved {
        slot_id: OpaqueId,
    }

    #[test]
    fn ids_normalize_numbers_and_strings_to_the_same_value() {
        let numeric: Reserved = serde_json::from_value(json!({"slot_id": 123})).unwrap();
        let stringly: Reserved = serde_json::from_value(json!({"slot_id": "123"})).unwrap();
        assert_eq!(numeric.slot_id, stringly.slot_id);
        assert_eq!(numeric.slot_id.as_str(), "123");
    }

    #[test]
    fn one_or_many_accepts_both_shapes() {
        let single: OneOrMany<Reserved> =
            serde_json::from_value(json!({"slot_id": 7})).unwrap();
        assert_eq!(single.into_first().unwrap().slot_id.as_str(), "7");

        let array: OneOrMany<Reserved> =
            serde_json::from_value(json!([{"slot_id": "8"}, {"slot_id": "9"}])).unwrap();
        assert_eq!(array.into_first().unwrap().slot_id.as_str(), "8");

        let empty: OneOrMany<Reserved> = serde_json::from_value(json!([])).unwrap();
        assert!(empty.into_first().is_none());
    }
}
