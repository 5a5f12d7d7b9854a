//! Bucket-sharded persistence: `data/<00..ff>.json`.

pub mod store;

pub use store::{BucketMap, BucketStore};
