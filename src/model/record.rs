//! Wire (de)serialization for [`Record`].
//!
//! `value`'s JSON shape depends on the sibling `type` tag, so a plain derive
//! can't express it. `RawRecord` is the literal bucket-file shape; `Record`
//! converts through it by hand, mirroring the teacher's
//! `#[serde(try_from = "...", into = "...")]` newtype idiom scaled up to a
//! whole struct.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::types::{ConflictLoser, Record, RecordId, ValueType};
use super::value::{from_json, to_json};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    id: RecordId,
    key: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    created_at: i64,
    updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conflict_loser: Option<ConflictLoser>,
    value: JsonValue,
}

impl TryFrom<RawRecord> for Record {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let value = from_json(raw.value_type, raw.value)
            .map_err(|e| format!("record `{}`: {e}", raw.key))?;
        Ok(Self {
            id: raw.id,
            key: raw.key,
            value_type: raw.value_type,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            deleted_at: raw.deleted_at,
            conflict_loser: raw.conflict_loser,
            value,
        })
    }
}

impl From<Record> for RawRecord {
    fn from(record: Record) -> Self {
        Self {
            id: record.id,
            key: record.key,
            value_type: record.value_type,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
            conflict_loser: record.conflict_loser,
            value: to_json(&record.value),
        }
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        RawRecord::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawRecord::deserialize(deserializer)?;
        Record::try_from(raw).map_err(serde::de::Error::custom)
    }
}
