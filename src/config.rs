//! Store configuration.
//!
//! `StoreConfig` is a plain value type the embedder constructs; there is no
//! file loader here (`spec.md` names the configuration loader as an
//! external collaborator; `Store::open` never reads a file itself).
//! Embedders who do want to load it from their own TOML/JSON get
//! `serde::Deserialize` for free, following the teacher's
//! `#[serde(deny_unknown_fields)]` + per-field `default_*()` idiom.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level store configuration. Mirrors `spec.md` §6's configuration
/// table field-for-field, plus a `debounce` knob promoted from the
/// "consider exposing it" open question in §9.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// HTTP(S) URL of the `origin` remote. `None` means local-only: sync
    /// still runs (commits land locally) but fetch/push are skipped.
    #[serde(default)]
    pub repo_url: Option<String>,

    /// Branch all replicas converge on.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Username supplied to the git transport's credential callback.
    #[serde(default = "default_username")]
    pub username: String,

    /// Token (password) supplied alongside `username`. `None` disables
    /// authentication (suitable for local or unauthenticated remotes).
    #[serde(default)]
    pub token: Option<String>,

    /// Root directory for the working copy (`<data_dir>/.git`,
    /// `<data_dir>/data/*.json`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Master switch for the scheduler (debounce + interval triggers).
    /// Manual `sync()` calls always work regardless of this flag.
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Whether mutations arm the debounce timer. Has no effect if
    /// `auto_sync` is false.
    #[serde(default = "default_true")]
    pub sync_on_change: bool,

    /// Interval-sync period in minutes. `0` disables the periodic trigger.
    #[serde(default)]
    pub sync_interval_minutes: u32,

    /// Debounce delay for the on-change trigger. `spec.md` hard-codes this
    /// at 10s; exposed here per the REDESIGN FLAGS note.
    #[serde(default = "default_debounce")]
    pub debounce: Duration,

    /// History compaction thresholds.
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repo_url: None,
            branch: default_branch(),
            username: default_username(),
            token: None,
            data_dir: default_data_dir(),
            auto_sync: default_true(),
            sync_on_change: default_true(),
            sync_interval_minutes: 0,
            debounce: default_debounce(),
            history: HistoryConfig::default(),
        }
    }
}

/// History-compaction thresholds. Compaction fires after a successful sync
/// when either threshold is crossed; see `spec.md` §4.8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_write_count_threshold")]
    pub write_count_threshold: u64,

    #[serde(default = "default_write_bytes_threshold")]
    pub write_bytes_threshold: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            write_count_threshold: default_write_count_threshold(),
            write_bytes_threshold: default_write_bytes_threshold(),
        }
    }
}

fn default_branch() -> String {
    "main".to_owned()
}

fn default_username() -> String {
    "git".to_owned()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("storage/.git-storage")
}

const fn default_true() -> bool {
    true
}

const fn default_debounce() -> Duration {
    Duration::from_secs(10)
}

const fn default_write_count_threshold() -> u64 {
    200
}

const fn default_write_bytes_threshold() -> u64 {
    5 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.branch, "main");
        assert_eq!(cfg.username, "git");
        assert!(cfg.auto_sync);
        assert!(cfg.sync_on_change);
        assert_eq!(cfg.sync_interval_minutes, 0);
        assert_eq!(cfg.debounce, Duration::from_secs(10));
        assert!(cfg.history.enabled);
        assert_eq!(cfg.history.write_count_threshold, 200);
        assert_eq!(cfg.history.write_bytes_threshold, 5 * 1024 * 1024);
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"branch":"release"}"#).expect("parses");
        assert_eq!(cfg.branch, "release");
        assert_eq!(cfg.username, "git");
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<StoreConfig, _> = serde_json::from_str(r#"{"bogus":true}"#);
        assert!(result.is_err());
    }
}
