//! History compactor (`spec.md` §4.8): threshold-driven destructive history
//! flatten, invoked by the sync coordinator after every successful pipeline
//! run.

use std::sync::Arc;

use crate::bucket::BucketStore;
use crate::config::StoreConfig;
use crate::git::{GitBackend, GitError};

/// Bounds `.git` history growth by periodically discarding it and
/// recommitting the current working tree as a single commit.
pub struct Compactor {
    buckets: Arc<BucketStore>,
    git: Arc<dyn GitBackend>,
}

impl Compactor {
    #[must_use]
    pub fn new(buckets: Arc<BucketStore>, git: Arc<dyn GitBackend>) -> Self {
        Self { buckets, git }
    }

    /// Check the accumulated write counters against `config.history`'s
    /// thresholds and compact if either is crossed. Skipped when
    /// `history.enabled` is false or no remote is configured (there is
    /// nothing to push, so flattening local history alone buys nothing).
    /// Returns whether compaction ran.
    ///
    /// # Errors
    /// Returns the underlying `GitError` if history re-initialization or
    /// the post-compaction push fails.
    pub fn maybe_compact(&self, config: &StoreConfig) -> Result<bool, GitError> {
        if !config.history.enabled || config.repo_url.is_none() {
            return Ok(false);
        }

        let crossed = self.buckets.write_count() >= config.history.write_count_threshold
            || self.buckets.write_bytes() >= config.history.write_bytes_threshold;
        if !crossed {
            return Ok(false);
        }

        let span = tracing::info_span!(
            "compact",
            write_count = self.buckets.write_count(),
            write_bytes = self.buckets.write_bytes()
        );
        let _enter = span.enter();
        tracing::info!("history thresholds crossed, compacting");

        self.git
            .reinit_history(&config.data_dir, &config.branch, config.repo_url.as_deref())?;
        self.git
            .force_push(&config.data_dir, &config.branch, &config.username, config.token.as_deref())?;
        self.buckets.reset_counters();
        Ok(true)
    }
}
