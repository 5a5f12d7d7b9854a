//! The value codec: type inference on write, binary↔base64 on the wire, list
//! value wrapping for list meta `order` arrays.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number as JsonNumber, Value as JsonValue};

use super::types::{RecordId, ValueType};

/// A decoded record payload. `List` carries a list meta record's item-id
/// order; list *items* carry their own payload type (one of the other five
/// variants), never `List`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Binary(Vec<u8>),
    Object(Map<String, JsonValue>),
    Array(Vec<JsonValue>),
    List(Vec<RecordId>),
}

impl Value {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Number(_) => ValueType::Number,
            Self::Binary(_) => ValueType::Binary,
            Self::Object(_) => ValueType::Object,
            Self::Array(_) => ValueType::Array,
            Self::List(_) => ValueType::List,
        }
    }

    /// Tag a conflict-losing object value with `__conflictLoser: true` so
    /// consumers reading only the value (not the record envelope) can still
    /// notice. No-op for non-object values.
    pub fn mark_conflict_loser(&mut self) {
        if let Self::Object(map) = self {
            map.insert("__conflictLoser".to_owned(), JsonValue::Bool(true));
        }
    }
}

/// Infer the value type the way a dynamically-typed caller would: this is
/// the Rust-native surface for callers who want spec.md's "type inferred on
/// write" behavior rather than constructing a [`Value`] directly.
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Binary(b.to_vec())
    }
}

impl From<Map<String, JsonValue>> for Value {
    fn from(m: Map<String, JsonValue>) -> Self {
        Self::Object(m)
    }
}

impl From<Vec<JsonValue>> for Value {
    fn from(a: Vec<JsonValue>) -> Self {
        Self::Array(a)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Intermediate wire shape for a [`Value`] tagged by a sibling `type` field.
/// `Record`'s `#[serde(try_from/into)]` impl dispatches here once it knows
/// the type tag, since the JSON shape of `value` depends on it.
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Number(n) => JsonNumber::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number),
        Value::Binary(b) => JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b)),
        Value::Object(m) => JsonValue::Object(m.clone()),
        Value::Array(a) => JsonValue::Array(a.clone()),
        Value::List(ids) => JsonValue::Object(Map::from_iter([(
            "order".to_owned(),
            JsonValue::Array(
                ids.iter()
                    .map(|id| JsonValue::String(id.to_string()))
                    .collect(),
            ),
        )])),
    }
}

/// Decode a JSON payload given the type tag it was written with.
///
/// # Errors
/// Returns an error string if the payload's JSON shape disagrees with
/// `value_type` (e.g. a `binary` value that isn't valid base64, or a `list`
/// meta record whose `order` entries aren't valid UUIDs).
pub fn from_json(value_type: ValueType, raw: JsonValue) -> Result<Value, String> {
    match value_type {
        ValueType::String => match raw {
            JsonValue::String(s) => Ok(Value::String(s)),
            JsonValue::Null => Ok(Value::String(String::new())),
            other => Err(format!("expected string value, got {other}")),
        },
        ValueType::Number => match raw.as_f64() {
            Some(n) => Ok(Value::Number(n)),
            None => Err(format!("expected number value, got {raw}")),
        },
        ValueType::Binary => match raw {
            JsonValue::String(s) => base64::engine::general_purpose::STANDARD
                .decode(s.as_bytes())
                .map(Value::Binary)
                .map_err(|e| format!("invalid base64 in binary value: {e}")),
            other => Err(format!("expected base64 string for binary value, got {other}")),
        },
        ValueType::Object => match raw {
            JsonValue::Object(m) => Ok(Value::Object(m)),
            other => Err(format!("expected object value, got {other}")),
        },
        ValueType::Array => match raw {
            JsonValue::Array(a) => Ok(Value::Array(a)),
            other => Err(format!("expected array value, got {other}")),
        },
        ValueType::List => {
            let JsonValue::Object(mut m) = raw else {
                return Err(format!("expected list meta object, got {raw}"));
            };
            let order = m.remove("order").unwrap_or(JsonValue::Array(Vec::new()));
            let JsonValue::Array(entries) = order else {
                return Err("list meta `order` field must be an array".to_owned());
            };
            let ids = entries
                .into_iter()
                .map(|e| match e {
                    JsonValue::String(s) => RecordId::parse(&s).map_err(|err| err.to_string()),
                    other => Err(format!("list meta order entry must be a string, got {other}")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(ids))
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        to_json(self).serialize(serializer)
    }
}

// `Value` cannot implement plain `Deserialize` on its own: the JSON shape is
// only interpretable once the sibling `type` tag is known. Record's raw
// deserialization path calls `from_json` explicitly instead.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(_deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Err(serde::de::Error::custom(
            "Value cannot be deserialized standalone; decode via model::value::from_json with the record's type tag",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trips_through_base64() {
        let bytes = vec![0u8, 1, 2, 255, 254, 10];
        let value = Value::Binary(bytes.clone());
        let json = to_json(&value);
        let decoded = from_json(ValueType::Binary, json).expect("decodes");
        assert_eq!(decoded, Value::Binary(bytes));
    }

    #[test]
    fn list_order_round_trips() {
        let ids = vec![RecordId::new(), RecordId::new()];
        let value = Value::List(ids.clone());
        let json = to_json(&value);
        let decoded = from_json(ValueType::List, json).expect("decodes");
        assert_eq!(decoded, Value::List(ids));
    }

    #[test]
    fn conflict_loser_marks_object_only() {
        let mut obj = Value::Object(Map::new());
        obj.mark_conflict_loser();
        assert!(matches!(&obj, Value::Object(m) if m.contains_key("__conflictLoser")));

        let mut s = Value::String("x".into());
        s.mark_conflict_loser();
        assert_eq!(s, Value::String("x".into()));
    }
}
