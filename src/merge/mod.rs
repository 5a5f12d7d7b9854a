//! Deterministic merge: per-record LWW, tombstone-aware list-item merge,
//! and the two-phase list order normalizer.

pub mod list_item;
pub mod lww;
pub mod normalize;

pub use list_item::{merge_list_item, ListItemMerge};
pub use lww::merge_scalar;
pub use normalize::{apply_pending_losers, reconcile_all_lists, reconcile_list_order, PendingLoser};
