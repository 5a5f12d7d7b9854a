//! The bucket store: 256 pretty-printed JSON files under `<data_dir>/data`,
//! sharded by the first hex byte of `sha1(key)`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::Record;

/// A single bucket's contents: user key → record. `BTreeMap` keeps
/// serialized output deterministic, which matters for compaction (identical
/// merged input must produce byte-identical bucket files across replicas).
pub type BucketMap = BTreeMap<String, Record>;

/// Read/write access to the 256 bucket files plus the running write
/// counters the compactor consults.
pub struct BucketStore {
    data_dir: PathBuf,
    write_count: AtomicU64,
    write_bytes: AtomicU64,
}

impl BucketStore {
    #[must_use]
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            write_count: AtomicU64::new(0),
            write_bytes: AtomicU64::new(0),
        }
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.data_dir.join("data").join(format!("{bucket}.json"))
    }

    /// Read a bucket's contents. A missing or unparseable file yields an
    /// empty map rather than an error — single-shard corruption is
    /// tolerated so it doesn't take the whole store down; the next write to
    /// any key in that bucket heals the file. `on_corrupt` is invoked with a
    /// description when a file exists but fails to parse.
    pub fn read(&self, bucket: &str, on_corrupt: impl FnOnce(&str)) -> BucketMap {
        let path = self.bucket_path(bucket);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return BucketMap::new(),
        };
        match serde_json::from_str::<BucketMap>(&raw) {
            Ok(map) => map,
            Err(e) => {
                on_corrupt(&format!("bucket `{bucket}` at {}: {e}", path.display()));
                tracing::warn!(bucket, error = %e, "corrupt bucket file, treating as empty");
                BucketMap::new()
            }
        }
    }

    /// Write a bucket's full contents, replacing the file in whole.
    /// Increments the write counters the compactor polls.
    ///
    /// # Errors
    /// Returns an I/O error if the directory can't be created or the file
    /// can't be written.
    pub fn write(&self, bucket: &str, map: &BucketMap) -> std::io::Result<()> {
        let path = self.bucket_path(bucket);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(map)
            .unwrap_or_else(|_| "{}".to_owned());
        fs::write(&path, &serialized)?;
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.write_bytes
            .fetch_add(serialized.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    /// Enumerate bucket ids present on disk (`data/*.json`, extension
    /// stripped). Bounded at ≤256 entries; a flat listing is sufficient.
    ///
    /// # Errors
    /// Returns an I/O error if the data directory can't be read (a missing
    /// directory is treated as "no buckets yet", not an error).
    pub fn list_buckets(&self) -> std::io::Result<Vec<String>> {
        let dir = self.data_dir.join("data");
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut buckets = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    buckets.push(stem.to_owned());
                }
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn write_bytes(&self) -> u64 {
        self.write_bytes.load(Ordering::SeqCst)
    }

    /// Reset both write counters to zero. Called by the compactor after a
    /// successful history flatten.
    pub fn reset_counters(&self) {
        self.write_count.store(0, Ordering::SeqCst);
        self.write_bytes.store(0, Ordering::SeqCst);
    }
}
