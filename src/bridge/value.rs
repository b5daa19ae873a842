//! Structured values crossing the host/scripted-component boundary
//!
//! Every record exchanged with a scripted decoder (start metadata, decode
//! input, emitted output) is a `ScriptValue`. The host builds and inspects
//! these values; the engine translates them to and from its native types.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A value passed across the scripting boundary
///
/// Serializes naturally: integers and strings as themselves, byte sequences
/// as number arrays, maps as JSON objects. This is what sinks forward.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    /// Build a map value from key/value pairs
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a key in a map value. Returns None for non-map values.
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i64> for ScriptValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<u8>> for ScriptValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for ScriptValue {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // JSON is the canonical rendering. Serialization of this enum
        // cannot fail (string keys only, no non-finite numbers).
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_accessors() {
        let record = ScriptValue::map([
            ("time", ScriptValue::Int(42)),
            ("data", ScriptValue::Bytes(vec![0x55, 0xAA])),
            ("driver", ScriptValue::from("demo")),
        ]);

        assert_eq!(record.get("time").and_then(ScriptValue::as_int), Some(42));
        assert_eq!(
            record.get("data").and_then(ScriptValue::as_bytes),
            Some(&[0x55, 0xAA][..])
        );
        assert_eq!(
            record.get("driver").and_then(ScriptValue::as_str),
            Some("demo")
        );
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        assert!(ScriptValue::Int(1).as_str().is_none());
        assert!(ScriptValue::from("x").as_int().is_none());
        assert!(ScriptValue::Int(1).get("key").is_none());
    }

    #[test]
    fn test_json_rendering() {
        let record = ScriptValue::map([
            ("duration", ScriptValue::Int(10)),
            ("data", ScriptValue::Bytes(vec![1, 2])),
        ]);
        assert_eq!(record.to_string(), r#"{"data":[1,2],"duration":10}"#);
    }
}
