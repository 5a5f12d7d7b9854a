//! List normalizer (spec.md §4.5): Phase A applies pending merge losers as
//! new list items; Phase B reconciles list order against the surviving
//! record set so two replicas that have observed the same records always
//! compute the same order.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::bucket::BucketMap;
use crate::model::{list_item_key, list_name_from_meta_key, parse_list_item_key, ConflictLoser, Record, RecordId, Value};

/// One list item that lost a per-item merge and needs a fresh slot.
pub struct PendingLoser {
    pub list_name: String,
    pub winner_item_id: RecordId,
    pub record: Record,
}

/// Phase A — apply pending losers across all affected buckets.
///
/// For each loser: mint a fresh item id, rewrite the record under the new
/// `list:<L>:item:<newId>` key tagged with `conflictLoser`, and insert the
/// new id immediately after the winner's item id in the list meta's order
/// (or append if the winner is no longer present). Losers sharing a winner
/// are applied in *descending* `(updated_at, id)` order (spec.md §4.5:
/// "applied in reverse order of `(updatedAt, id)`") so that each successive
/// "insert right after winner" pushes the next-later loser back in front of
/// the ones already inserted, leaving them in ascending order following the
/// winner once every loser has been applied.
///
/// `buckets` maps bucket id → that bucket's map; callers are expected to
/// have already loaded every bucket a loser or its list meta could live in.
pub fn apply_pending_losers(
    buckets: &mut HashMap<String, BucketMap>,
    bucket_of: impl Fn(&str) -> String,
    mut losers: Vec<PendingLoser>,
    now: i64,
) {
    // Descending (updated_at, id): processing the latest loser first means
    // each subsequent (earlier) loser's "insert after winner" lands it
    // ahead of the ones already placed, so the final order after winner is
    // ascending (earliest loser first), per spec.md §4.5.
    losers.sort_by(|a, b| {
        b.record
            .updated_at
            .cmp(&a.record.updated_at)
            .then_with(|| b.record.id.to_string().cmp(&a.record.id.to_string()))
    });

    for loser in losers {
        let new_id = RecordId::new();
        let mut new_value = loser.record.value.clone();
        new_value.mark_conflict_loser();
        let new_key = list_item_key(&loser.list_name, new_id);
        let new_record = Record {
            id: new_id,
            key: new_key.clone(),
            value_type: loser.record.value_type,
            created_at: loser.record.created_at,
            updated_at: loser.record.updated_at,
            deleted_at: loser.record.deleted_at,
            conflict_loser: Some(ConflictLoser { winner_id: loser.winner_item_id }),
            value: new_value,
        };

        let item_bucket = bucket_of(&new_key);
        buckets.entry(item_bucket).or_default().insert(new_key, new_record);

        let meta_key = crate::model::list_meta_key(&loser.list_name);
        let meta_bucket = bucket_of(&meta_key);
        let bucket_map = buckets.entry(meta_bucket).or_default();
        if let Some(meta) = bucket_map.get_mut(&meta_key) {
            if let Value::List(order) = &mut meta.value {
                let pos = order.iter().position(|id| *id == loser.winner_item_id);
                match pos {
                    Some(idx) => order.insert(idx + 1, new_id),
                    None => order.push(new_id),
                }
                meta.updated_at = meta.updated_at.max(now);
            }
        }
    }
}

/// Phase B — reconcile one list's order against its surviving record set.
/// Returns `true` if the meta record's order changed (the caller is
/// responsible for persisting the updated bucket).
///
/// Steps (spec.md §4.5 Phase B):
/// 1. Collect every live item record belonging to the list.
/// 2. Filter the meta order to ids with a live record.
/// 3. Partition live items missing from that filtered order into losers
///    (carry `conflict_loser`) and others.
/// 4. Sort both groups by `(updated_at ascending, item id ascending)`.
/// 5. Insert each loser after its winner (or append if the winner is gone).
/// 6. Append remaining others at the end.
#[must_use]
pub fn reconcile_list_order(meta: &mut Record, live_items: &[&Record]) -> bool {
    let Value::List(ref order) = meta.value else {
        return false;
    };

    let live_ids: HashSet<RecordId> = live_items.iter().map(|r| r.id).collect();
    let filtered: Vec<RecordId> = order.iter().copied().filter(|id| live_ids.contains(id)).collect();
    let filtered_set: HashSet<RecordId> = filtered.iter().copied().collect();

    let mut missing: Vec<&Record> = live_items
        .iter()
        .copied()
        .filter(|r| !filtered_set.contains(&r.id))
        .collect();
    missing.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.to_string().cmp(&b.id.to_string())));

    let (losers, others): (Vec<&Record>, Vec<&Record>) =
        missing.into_iter().partition(|r| r.conflict_loser.is_some());

    let mut reconciled = filtered;
    for loser in losers {
        let winner_id = loser.conflict_loser.as_ref().expect("partitioned as loser").winner_id;
        match reconciled.iter().position(|id| *id == winner_id) {
            Some(idx) => reconciled.insert(idx + 1, loser.id),
            None => reconciled.push(loser.id),
        }
    }
    for other in others {
        reconciled.push(other.id);
    }

    if let Value::List(order) = &mut meta.value {
        if *order == reconciled {
            return false;
        }
        *order = reconciled;
        true
    } else {
        false
    }
}

/// Run Phase B across every list present in `buckets`, using `all_records`
/// (the full merged record set across every bucket) to find each list's
/// live items. Mutates the meta records in place and reports which list
/// names changed.
#[must_use]
pub fn reconcile_all_lists(
    buckets: &mut HashMap<String, BucketMap>,
    bucket_of: impl Fn(&str) -> String,
) -> Vec<String> {
    let all_records: BTreeMap<String, Record> = buckets
        .values()
        .flat_map(|m| m.iter())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let list_names: HashSet<String> = all_records
        .keys()
        .filter_map(|k| list_name_from_meta_key(k).filter(|_| parse_list_item_key(k).is_none()))
        .map(str::to_owned)
        .collect();

    let mut changed = Vec::new();
    for list_name in list_names {
        let live_items: Vec<Record> = all_records
            .values()
            .filter_map(|r| {
                parse_list_item_key(&r.key).and_then(|parsed| {
                    (parsed.list_name == list_name && r.is_live()).then(|| r.clone())
                })
            })
            .collect();
        let live_refs: Vec<&Record> = live_items.iter().collect();

        let meta_key = crate::model::list_meta_key(&list_name);
        let meta_bucket_id = bucket_of(&meta_key);
        let Some(bucket_map) = buckets.get_mut(&meta_bucket_id) else { continue };
        let Some(meta) = bucket_map.get_mut(&meta_key) else { continue };
        if !meta.is_live() {
            continue;
        }
        if reconcile_list_order(meta, &live_refs) {
            changed.push(list_name);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;

    fn live_item(list: &str, updated_at: i64) -> Record {
        let id = RecordId::new();
        Record {
            id,
            key: list_item_key(list, id),
            value_type: ValueType::Object,
            created_at: updated_at,
            updated_at,
            deleted_at: None,
            conflict_loser: None,
            value: Value::Object(serde_json::Map::new()),
        }
    }

    fn meta(list: &str, order: Vec<RecordId>) -> Record {
        Record {
            id: RecordId::new(),
            key: crate::model::list_meta_key(list),
            value_type: ValueType::List,
            created_at: 0,
            updated_at: 0,
            deleted_at: None,
            conflict_loser: None,
            value: Value::List(order),
        }
    }

    #[test]
    fn reconcile_prunes_tombstoned_and_preserves_live_order() {
        let a = live_item("l", 10);
        let b = live_item("l", 20);
        let mut m = meta("l", vec![a.id, b.id]);
        let live = vec![&a, &b];
        assert!(!reconcile_list_order(&mut m, &live));
    }

    #[test]
    fn reconcile_appends_untracked_live_items_sorted() {
        let a = live_item("l", 10);
        let b = live_item("l", 5);
        let mut m = meta("l", vec![]);
        let live = vec![&a, &b];
        assert!(reconcile_list_order(&mut m, &live));
        let Value::List(order) = &m.value else { panic!("list") };
        assert_eq!(order, &vec![b.id, a.id]);
    }

    #[test]
    fn reconcile_inserts_loser_after_winner() {
        let winner = live_item("l", 10);
        let mut loser = live_item("l", 20);
        loser.conflict_loser = Some(ConflictLoser { winner_id: winner.id });
        let mut m = meta("l", vec![winner.id]);
        let live = vec![&winner, &loser];
        assert!(reconcile_list_order(&mut m, &live));
        let Value::List(order) = &m.value else { panic!("list") };
        assert_eq!(order, &vec![winner.id, loser.id]);
    }

    #[test]
    fn reconcile_appends_loser_when_winner_gone() {
        let mut loser = live_item("l", 20);
        loser.conflict_loser = Some(ConflictLoser { winner_id: RecordId::new() });
        let mut m = meta("l", vec![]);
        let live = vec![&loser];
        assert!(reconcile_list_order(&mut m, &live));
        let Value::List(order) = &m.value else { panic!("list") };
        assert_eq!(order, &vec![loser.id]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let a = live_item("l", 10);
        let b = live_item("l", 20);
        let mut m = meta("l", vec![]);
        let live = vec![&a, &b];
        assert!(reconcile_list_order(&mut m, &live));
        assert!(!reconcile_list_order(&mut m, &live));
    }

    fn bucket_of_for_test(key: &str) -> String {
        crate::model::bucket_of(key)
    }

    #[test]
    fn apply_pending_losers_orders_multiple_losers_ascending_after_winner() {
        let winner = live_item("l", 10);
        let meta_rec = meta("l", vec![winner.id]);
        let meta_key = meta_rec.key.clone();
        let meta_bucket = bucket_of_for_test(&meta_key);

        let mut buckets: HashMap<String, BucketMap> = HashMap::new();
        buckets.entry(meta_bucket).or_default().insert(meta_key.clone(), meta_rec);

        // Three losers sharing `winner`, submitted out of (updated_at, id)
        // order, so the sort inside `apply_pending_losers` is exercised.
        let l2 = live_item("l", 2000);
        let l1 = live_item("l", 1000);
        let l3 = live_item("l", 3000);
        let losers = vec![
            PendingLoser { list_name: "l".to_owned(), winner_item_id: winner.id, record: l2.clone() },
            PendingLoser { list_name: "l".to_owned(), winner_item_id: winner.id, record: l1.clone() },
            PendingLoser { list_name: "l".to_owned(), winner_item_id: winner.id, record: l3.clone() },
        ];

        apply_pending_losers(&mut buckets, bucket_of_for_test, losers, 9999);

        let updated_meta = buckets.get(&bucket_of_for_test(&meta_key)).expect("meta bucket present").get(&meta_key).expect("meta present");
        let Value::List(order) = &updated_meta.value else { panic!("list") };
        assert_eq!(order[0], winner.id);

        // The three new loser ids follow the winner in ascending
        // (updated_at, id) order: l1 (1000), l2 (2000), l3 (3000) —
        // spec.md §4.5's "applied in reverse order of (updatedAt, id) so
        // that ... they appear in ascending order after the winner."
        let trailing: Vec<&Record> = order[1..]
            .iter()
            .map(|id| {
                let key = list_item_key("l", *id);
                buckets.get(&bucket_of_for_test(&key)).and_then(|m| m.get(&key)).expect("loser record present")
            })
            .collect();
        assert_eq!(trailing.len(), 3);
        assert_eq!(trailing[0].updated_at, 1000);
        assert_eq!(trailing[1].updated_at, 2000);
        assert_eq!(trailing[2].updated_at, 3000);
    }
}
