//! Core record types: the single tagged record that backs every user key,
//! list meta record, and list item record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A value failed validation as a [`RecordId`] or similar identifier.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: `{value}`: {reason}")]
pub struct ValidationError {
    pub kind: &'static str,
    pub value: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// A validated UUID identifying a record. Minted on first write, stable
/// across updates, and used as the merge tie-breaker (lexicographic compare
/// on its string form).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(Uuid);

impl RecordId {
    /// Mint a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a `RecordId` from its canonical hyphenated string form.
    ///
    /// # Errors
    /// Returns an error if `s` is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ValidationError {
                kind: "record id",
                value: s.to_owned(),
                reason: e.to_string(),
            })
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0.to_string()
    }
}

// ---------------------------------------------------------------------------
// ValueType
// ---------------------------------------------------------------------------

/// The type tag carried by every record. Drives codec choice (binary vs.
/// text) and merge eligibility (only `list` meta records own an `order`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Binary,
    Object,
    Array,
    List,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Binary => "binary",
            Self::Object => "object",
            Self::Array => "array",
            Self::List => "list",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ConflictLoser
// ---------------------------------------------------------------------------

/// Marker applied to a list-item record that lost a per-item merge but was
/// re-added as a new item. May appear only on records whose key parses as a
/// list item (spec invariant).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictLoser {
    pub winner_id: RecordId,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The universal persisted unit. One per user key: scalar keys, list meta
/// records, and list item records are all `Record`s distinguished by `key`
/// shape and `value_type`.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub key: String,
    pub value_type: ValueType,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
    pub conflict_loser: Option<ConflictLoser>,
    pub value: crate::model::value::Value,
}

impl Record {
    /// A key is "live" iff it has no tombstone timestamp.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Mint a brand-new live record at `now`.
    #[must_use]
    pub fn new(key: String, value_type: ValueType, value: crate::model::value::Value, now: i64) -> Self {
        Self {
            id: RecordId::new(),
            key,
            value_type,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            conflict_loser: None,
            value,
        }
    }

    /// Apply a mutation at `now`: preserves `id`/`created_at`, advances
    /// `updated_at`, clears any prior tombstone.
    pub fn mutate(&mut self, value_type: ValueType, value: crate::model::value::Value, now: i64) {
        self.value_type = value_type;
        self.value = value;
        self.updated_at = now;
        self.deleted_at = None;
    }

    /// Apply a tombstone at `now`. Value is retained for conflict-resolution
    /// visibility but the key becomes semantically absent.
    pub fn delete(&mut self, now: i64) {
        self.updated_at = now;
        self.deleted_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::Value;

    #[test]
    fn record_id_round_trips_through_string() {
        let id = RecordId::new();
        let s: String = id.into();
        let back = RecordId::parse(&s).expect("valid uuid string");
        assert_eq!(id, back);
    }

    #[test]
    fn record_id_rejects_garbage() {
        assert!(RecordId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn mutate_preserves_id_and_created_at_clears_tombstone() {
        let mut r = Record::new("k".into(), ValueType::String, Value::String("a".into()), 100);
        r.delete(200);
        assert_eq!(r.deleted_at, Some(200));
        let id_before = r.id;
        let created_before = r.created_at;
        r.mutate(ValueType::String, Value::String("b".into()), 300);
        assert_eq!(r.id, id_before);
        assert_eq!(r.created_at, created_before);
        assert_eq!(r.updated_at, 300);
        assert_eq!(r.deleted_at, None);
        assert!(r.is_live());
    }
}
