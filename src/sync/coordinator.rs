//! Sync coordinator (`spec.md` §4.6): the single-flight fetch→merge→
//! normalize→stage→commit→push pipeline, plus the compactor it triggers on
//! success.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::bucket::{BucketMap, BucketStore};
use crate::clock::now_ms;
use crate::config::StoreConfig;
use crate::git::{GitBackend, GitError};
use crate::merge::{apply_pending_losers, merge_list_item, merge_scalar, reconcile_all_lists, PendingLoser};
use crate::model::{bucket_of, parse_list_item_key};

use super::compactor::Compactor;
use super::events::{EventBus, SyncEvent, SyncEventKind, SyncStatus};

/// Result of a `sync()` call. The coordinator never lets an error escape
/// `sync()` itself (`spec.md` §7's propagation policy) — every failure mode
/// the pipeline can hit is captured here instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn ok() -> Self {
        Self { success: true, error: None }
    }

    fn err(message: impl Into<String>) -> Self {
        Self { success: false, error: Some(message.into()) }
    }
}

/// A snapshot of the coordinator's state, returned by `Store::get_status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: SyncStatus,
    pub in_flight: bool,
    pub last_at: Option<i64>,
    pub last_error: Option<String>,
}

struct State {
    status: SyncStatus,
    in_flight: bool,
    last_at: Option<i64>,
    last_error: Option<String>,
}

impl Default for State {
    fn default() -> Self {
        Self { status: SyncStatus::Idle, in_flight: false, last_at: None, last_error: None }
    }
}

/// Orchestrates one full sync round against a shared `BucketStore` and
/// `GitBackend`. Single-flight: a second call while one round is already
/// executing returns immediately without touching state or emitting events.
pub struct SyncCoordinator {
    buckets: Arc<BucketStore>,
    git: Arc<dyn GitBackend>,
    events: Arc<EventBus>,
    config: Arc<Mutex<StoreConfig>>,
    compactor: Compactor,
    state: Mutex<State>,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(
        buckets: Arc<BucketStore>,
        git: Arc<dyn GitBackend>,
        events: Arc<EventBus>,
        config: Arc<Mutex<StoreConfig>>,
    ) -> Self {
        let compactor = Compactor::new(Arc::clone(&buckets), Arc::clone(&git));
        Self { buckets, git, events, config, compactor, state: Mutex::new(State::default()) }
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().expect("sync state lock poisoned");
        StatusSnapshot {
            state: state.status,
            in_flight: state.in_flight,
            last_at: state.last_at,
            last_error: state.last_error.clone(),
        }
    }

    /// Run one sync round. Returns `{success: false, error: "sync already in
    /// flight"}` without emitting events or changing state if a round is
    /// already executing (spec.md §4.6, §7 kind 6).
    pub fn sync(&self, reason: &str) -> SyncOutcome {
        {
            let mut state = self.state.lock().expect("sync state lock poisoned");
            if state.in_flight {
                return SyncOutcome::err("sync already in flight");
            }
            state.in_flight = true;
            state.status = SyncStatus::Syncing;
        }

        let span = tracing::info_span!("sync", reason);
        let _enter = span.enter();

        self.events.emit(&SyncEvent {
            kind: SyncEventKind::Start,
            at: now_ms(),
            reason: reason.to_owned(),
            status: SyncStatus::Syncing,
        });

        let result = self.run_pipeline(reason);

        let mut state = self.state.lock().expect("sync state lock poisoned");
        state.in_flight = false;
        state.last_at = Some(now_ms());
        match result {
            Ok(()) => {
                state.status = SyncStatus::Idle;
                state.last_error = None;
                drop(state);
                tracing::info!("sync finished");
                self.events.emit(&SyncEvent {
                    kind: SyncEventKind::Finish,
                    at: now_ms(),
                    reason: reason.to_owned(),
                    status: SyncStatus::Idle,
                });
                SyncOutcome::ok()
            }
            Err(message) => {
                state.status = SyncStatus::Error;
                state.last_error = Some(message.clone());
                drop(state);
                tracing::warn!(error = %message, "sync failed");
                self.events.emit(&SyncEvent {
                    kind: SyncEventKind::Error,
                    at: now_ms(),
                    reason: reason.to_owned(),
                    status: SyncStatus::Error,
                });
                SyncOutcome::err(message)
            }
        }
    }

    fn run_pipeline(&self, reason: &str) -> Result<(), String> {
        let config = self.config.lock().expect("config lock poisoned").clone();
        let path = config.data_dir.clone();

        self.git
            .ensure_repo(&path, &config.branch, config.repo_url.as_deref())
            .map_err(|e| e.to_string())?;
        self.git.ensure_branch(&path, &config.branch).map_err(|e| e.to_string())?;

        let has_remote = config.repo_url.is_some()
            && self.git.is_remote_configured(&path).map_err(|e| e.to_string())?;

        if has_remote {
            let fetch_span = tracing::info_span!("fetch");
            let _enter = fetch_span.enter();
            if let Err(e) = self.git.fetch_branch(&path, &config.branch, &config.username, config.token.as_deref()) {
                if !e.is_remote_branch_absent() {
                    return Err(e.to_string());
                }
                tracing::debug!(branch = %config.branch, "remote branch absent, skipping fetch");
            }
        }

        match self.merge_and_normalize(&path, &config, has_remote) {
            Ok(()) => {}
            Err(e) => {
                let message = e.to_string();
                if message.contains("NotFoundError") && message.contains("origin/") {
                    tracing::info!("remote branch absent mid-pipeline, bootstrapping local state");
                } else {
                    return Err(message);
                }
            }
        }

        {
            let commit_span = tracing::info_span!("commit");
            let _enter = commit_span.enter();
            self.git
                .stage_and_commit(&path, &format!("sync: {reason}"))
                .map_err(|e| e.to_string())?;
        }

        if has_remote {
            let push_span = tracing::info_span!("push");
            let _enter = push_span.enter();
            self.git
                .force_push(&path, &config.branch, &config.username, config.token.as_deref())
                .map_err(|e| e.to_string())?;
        }

        self.compactor.maybe_compact(&config).map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Steps 4–7 of `spec.md` §4.6: enumerate buckets from both sides,
    /// merge record-by-record, apply pending conflict losers, reconcile
    /// list order, write merged buckets back to disk.
    fn merge_and_normalize(&self, path: &Path, config: &StoreConfig, has_remote: bool) -> Result<(), GitError> {
        let local_bucket_ids: HashSet<String> = self.buckets.list_buckets()?.into_iter().collect();
        let remote_bucket_files = if has_remote {
            self.git.list_files_at_remote_branch(path, &config.branch)?
        } else {
            Vec::new()
        };
        let remote_bucket_ids: HashSet<String> = remote_bucket_files
            .iter()
            .filter_map(|f| f.strip_prefix("data/").and_then(|s| s.strip_suffix(".json")))
            .map(str::to_owned)
            .collect();
        let union: HashSet<String> = local_bucket_ids.union(&remote_bucket_ids).cloned().collect();

        let mut merged: HashMap<String, BucketMap> = HashMap::new();
        let mut pending_losers: Vec<PendingLoser> = Vec::new();

        for bucket in &union {
            let local_map = self.buckets.read(bucket, |msg| tracing::warn!(%msg, "corrupt local bucket"));
            let remote_map = if has_remote {
                self.read_remote_bucket(path, &config.branch, bucket)
            } else {
                BucketMap::new()
            };

            let keys: HashSet<&String> = local_map.keys().chain(remote_map.keys()).collect();
            let mut merged_bucket = BucketMap::new();
            for key in keys {
                let local_record = local_map.get(key);
                let remote_record = remote_map.get(key);
                if let Some(parsed) = parse_list_item_key(key) {
                    if let Some(item_merge) = merge_list_item(local_record, remote_record) {
                        if let Some(loser) = item_merge.loser {
                            pending_losers.push(PendingLoser {
                                list_name: parsed.list_name.clone(),
                                winner_item_id: parsed.item_id,
                                record: loser,
                            });
                        }
                        merged_bucket.insert(key.clone(), item_merge.winner);
                    }
                } else if let Some(winner) = merge_scalar(local_record, remote_record) {
                    merged_bucket.insert(key.clone(), winner);
                }
            }
            merged.insert(bucket.clone(), merged_bucket);
        }

        tracing::debug!(buckets = union.len(), losers = pending_losers.len(), "merged buckets");

        apply_pending_losers(&mut merged, bucket_of, pending_losers, now_ms());
        let changed_lists = reconcile_all_lists(&mut merged, bucket_of);
        if !changed_lists.is_empty() {
            tracing::debug!(count = changed_lists.len(), "reconciled list order");
        }

        for (bucket, map) in &merged {
            self.buckets.write(bucket, map)?;
        }

        Ok(())
    }

    fn read_remote_bucket(&self, path: &Path, branch: &str, bucket: &str) -> BucketMap {
        let file_path = format!("data/{bucket}.json");
        match self.git.read_blob_at_remote_branch(path, branch, &file_path) {
            Ok(Some(bytes)) => match serde_json::from_slice::<BucketMap>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(bucket, error = %e, "corrupt remote bucket, treating as empty");
                    BucketMap::new()
                }
            },
            Ok(None) => BucketMap::new(),
            Err(e) => {
                tracing::warn!(bucket, error = %e, "failed to read remote bucket, treating as empty");
                BucketMap::new()
            }
        }
    }
}
