//! The unified error type for store operations.
//!
//! Each variant is self-contained: a caller should be able to understand
//! what went wrong and what to do about it without digging through source.
//! Mirrors `spec.md` §7's error kinds 4–6 directly; kinds 1–3 (transient
//! transport failure, remote-branch-absent, corrupt bucket) are captured
//! inside the sync pipeline rather than returned from individual
//! operations — see [`crate::sync::SyncOutcome`].

use thiserror::Error;

use crate::model::ValueType;

/// Errors returned by [`crate::Store`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Operating on a key whose record type does not match the operation
    /// (e.g. a list op against a string key).
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value (key `{key}`, expected {expected}, found {actual})")]
    WrongType {
        key: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// `lset` (or another indexed list op) addressed an index outside the
    /// live element range.
    #[error("index out of range")]
    IndexOutOfRange { key: String, index: i64 },

    /// `sync()` was called while another sync round was already in flight.
    #[error("sync already in flight")]
    SyncInFlight,

    /// An I/O error occurred against the bucket store or data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The git transport layer failed.
    #[error("git error: {0}")]
    Git(#[from] crate::git::GitError),

    /// The supplied configuration was invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
