//! The record model: the tagged [`types::Record`] that backs every user
//! key, its [`value::Value`] codec, and the [`key`] router that maps user
//! keys to buckets and list-internal key shapes.

pub mod key;
pub mod record;
pub mod types;
pub mod value;

pub use key::{bucket_of, is_list_meta_key, list_item_key, list_meta_key, list_name_from_meta_key, parse_list_item_key, ListItemKey};
pub use types::{ConflictLoser, Record, RecordId, ValidationError, ValueType};
pub use value::Value;
