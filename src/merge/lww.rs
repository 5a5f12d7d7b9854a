//! Scalar last-write-wins merge (spec.md §4.3). Tombstones participate
//! identically to live records here; the list-item override (delete loses
//! to any concurrent live update) lives in [`super::list_item`].

use crate::model::Record;

/// Merge a pair of records for the same key.
///
/// - Both absent: caller drops the key (nothing to return).
/// - One absent: the other wins.
/// - Both present: newer `updated_at` wins; ties break on `id`
///   lexicographic `≥` (stable, deterministic — the side compared is
///   arbitrary, only the rule matters).
#[must_use]
pub fn merge_scalar(local: Option<&Record>, remote: Option<&Record>) -> Option<Record> {
    match (local, remote) {
        (None, None) => None,
        (Some(l), None) => Some(l.clone()),
        (None, Some(r)) => Some(r.clone()),
        (Some(l), Some(r)) => Some(pick_winner(l, r).clone()),
    }
}

/// Decide the winner between two live-or-tombstoned records by `updated_at`
/// (non-finite treated as 0) then `id` lexicographic compare.
#[must_use]
pub fn pick_winner<'a>(a: &'a Record, b: &'a Record) -> &'a Record {
    let ua = normalize_timestamp(a.updated_at);
    let ub = normalize_timestamp(b.updated_at);
    match ua.cmp(&ub) {
        std::cmp::Ordering::Greater => a,
        std::cmp::Ordering::Less => b,
        std::cmp::Ordering::Equal => {
            if a.id.to_string() >= b.id.to_string() {
                a
            } else {
                b
            }
        }
    }
}

fn normalize_timestamp(ts: i64) -> i64 {
    ts.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordId, Value, ValueType};

    fn record(id: RecordId, updated_at: i64) -> Record {
        Record {
            id,
            key: "k".to_owned(),
            value_type: ValueType::String,
            created_at: updated_at,
            updated_at,
            deleted_at: None,
            conflict_loser: None,
            value: Value::String("v".to_owned()),
        }
    }

    #[test]
    fn both_absent_drops() {
        assert_eq!(merge_scalar(None, None), None);
    }

    #[test]
    fn one_absent_other_wins() {
        let r = record(RecordId::new(), 100);
        assert_eq!(merge_scalar(Some(&r), None), Some(r.clone()));
        assert_eq!(merge_scalar(None, Some(&r)), Some(r));
    }

    #[test]
    fn strictly_newer_wins() {
        let a = record(RecordId::new(), 100);
        let b = record(RecordId::new(), 200);
        assert_eq!(merge_scalar(Some(&a), Some(&b)), Some(b));
    }

    #[test]
    fn tie_breaks_on_id_lexicographic_ge() {
        let id_low = RecordId::parse("00000000-0000-0000-0000-000000000001").expect("valid");
        let id_high = RecordId::parse("00000000-0000-0000-0000-000000000002").expect("valid");
        let a = record(id_low, 100);
        let b = record(id_high, 100);
        assert_eq!(merge_scalar(Some(&a), Some(&b)), Some(b));
    }

    #[test]
    fn merge_is_idempotent() {
        let a = record(RecordId::new(), 100);
        let b = record(RecordId::new(), 200);
        let once = merge_scalar(Some(&a), Some(&b));
        let twice = merge_scalar(once.as_ref(), Some(&b));
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        /// spec.md §8: "the merger is idempotent: merge(merge(l,r), r) = merge(l,r)"
        /// for any pair of scalar records sharing a key, across arbitrary
        /// timestamps and id orderings.
        #[test]
        fn merge_scalar_is_idempotent_for_arbitrary_timestamps(
            updated_a in -1_000_i64..1_000_i64,
            updated_b in -1_000_i64..1_000_i64,
            low_id in 0u128..2,
        ) {
            let id_a = RecordId::parse(&format!("00000000-0000-0000-0000-{:012x}", low_id)).expect("valid uuid");
            let id_b = RecordId::parse(&format!("00000000-0000-0000-0000-{:012x}", low_id + 1)).expect("valid uuid");
            let a = record(id_a, updated_a);
            let b = record(id_b, updated_b);

            let once = merge_scalar(Some(&a), Some(&b));
            let twice = merge_scalar(once.as_ref(), Some(&b));
            prop_assert_eq!(once, twice);
        }

        /// The winner is always one of the two inputs, never a fabricated
        /// third record, regardless of timestamp/id combination.
        #[test]
        fn pick_winner_always_returns_one_of_the_inputs(
            updated_a in -1_000_i64..1_000_i64,
            updated_b in -1_000_i64..1_000_i64,
        ) {
            let a = record(RecordId::new(), updated_a);
            let b = record(RecordId::new(), updated_b);
            let winner = pick_winner(&a, &b);
            prop_assert!(std::ptr::eq(winner, &a) || std::ptr::eq(winner, &b));
        }
    }
}
