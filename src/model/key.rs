//! Key routing: map a user key to its bucket, and encode/decode the
//! list-internal key shapes (`list:<L>` meta keys, `list:<L>:item:<id>` item
//! keys).

use sha1::{Digest, Sha1};

use super::types::RecordId;

pub const LIST_META_PREFIX: &str = "list:";
pub const LIST_ITEM_MARKER: &str = ":item:";

/// `bucketOf(key) = sha1(key)[0..1]` (hex, lowercase). The only hashing
/// policy every writer must agree on — bucket placement must be identical
/// across replicas or merges would silently miss keys.
#[must_use]
pub fn bucket_of(key: &str) -> String {
    let digest = Sha1::digest(key.as_bytes());
    format!("{:02x}", digest[0])
}

/// The meta key for list `name`: `list:<name>`.
#[must_use]
pub fn list_meta_key(name: &str) -> String {
    format!("{LIST_META_PREFIX}{name}")
}

/// The item key for item `id` within list `name`: `list:<name>:item:<id>`.
#[must_use]
pub fn list_item_key(name: &str, id: RecordId) -> String {
    format!("{LIST_META_PREFIX}{name}{LIST_ITEM_MARKER}{id}")
}

/// A key's list-item interpretation, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListItemKey {
    pub list_name: String,
    pub item_id: RecordId,
}

/// Parse `key` as a list item key.
///
/// Uses the **last** occurrence of `:item:` so list names that themselves
/// contain colons — or even the literal substring `:item:` — still
/// disambiguate to the final segment. The id must parse as a UUID; if not,
/// `key` is treated as an ordinary user key rather than a list item
/// (misparsing here would silently route a record into the wrong list).
#[must_use]
pub fn parse_list_item_key(key: &str) -> Option<ListItemKey> {
    let rest = key.strip_prefix(LIST_META_PREFIX)?;
    let marker_pos = rest.rfind(LIST_ITEM_MARKER)?;
    let list_name = &rest[..marker_pos];
    let id_str = &rest[marker_pos + LIST_ITEM_MARKER.len()..];
    let item_id = RecordId::parse(id_str).ok()?;
    Some(ListItemKey {
        list_name: list_name.to_owned(),
        item_id,
    })
}

/// Whether `key` is a list meta key (`list:<name>`, no `:item:` marker that
/// resolves to a valid item id).
#[must_use]
pub fn is_list_meta_key(key: &str) -> bool {
    key.starts_with(LIST_META_PREFIX) && parse_list_item_key(key).is_none()
}

/// Recover the list name a meta key refers to.
#[must_use]
pub fn list_name_from_meta_key(key: &str) -> Option<&str> {
    key.strip_prefix(LIST_META_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_of_is_two_lowercase_hex_digits() {
        let b = bucket_of("hello");
        assert_eq!(b.len(), 2);
        assert!(b.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn bucket_of_is_deterministic() {
        assert_eq!(bucket_of("same-key"), bucket_of("same-key"));
    }

    #[test]
    fn list_item_key_round_trips() {
        let id = RecordId::new();
        let key = list_item_key("todos", id);
        let parsed = parse_list_item_key(&key).expect("parses as list item");
        assert_eq!(parsed.list_name, "todos");
        assert_eq!(parsed.item_id, id);
    }

    #[test]
    fn list_name_containing_colons_disambiguates_to_last_marker() {
        let id = RecordId::new();
        let key = format!("list:weird:item:name{LIST_ITEM_MARKER}{id}");
        let parsed = parse_list_item_key(&key).expect("parses");
        assert_eq!(parsed.list_name, "weird:item:name");
        assert_eq!(parsed.item_id, id);
    }

    #[test]
    fn non_uuid_suffix_is_not_a_list_item() {
        let key = "list:todos:item:not-a-uuid";
        assert!(parse_list_item_key(key).is_none());
    }

    #[test]
    fn meta_key_is_not_an_item_key() {
        let key = list_meta_key("todos");
        assert!(parse_list_item_key(&key).is_none());
        assert!(is_list_meta_key(&key));
    }
}
