//! An embeddable key-value store that persists through a git repository and
//! converges across independent writers via scheduled three-way merges.
//!
//! A [`Store`] owns a bucket-sharded JSON record store on disk, a git
//! transport for fetch/commit/push, and a background scheduler that
//! debounces on-change syncs and drives a periodic interval sync. Scalars,
//! batch operations, key enumeration, and list operations are all
//! available without ever calling [`Store::sync`] directly — sync only
//! matters for convergence with other writers sharing the same remote.
//!
//! ```no_run
//! use git_kv_store::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::default());
//! store.set("greeting", "hello").expect("writes");
//! assert_eq!(store.get("greeting"), Some("hello".into()));
//! ```

pub mod bucket;
pub mod config;
pub mod error;
pub mod git;
pub mod glob;
pub mod merge;
pub mod model;
pub mod store;
pub mod sync;

mod clock;

pub use config::{HistoryConfig, StoreConfig};
pub use error::StoreError;
pub use model::{ConflictLoser, Record, RecordId, Value, ValueType};
pub use store::{ConfigUpdate, PopOutcome, ScanResult, Store};
pub use sync::{StatusSnapshot, SyncEvent, SyncEventKind, SyncOutcome, SyncStatus, Unsubscribe};
