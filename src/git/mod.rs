//! Git transport abstraction.
//!
//! `spec.md` treats git init/fetch/commit/push/status/blob-read/ref
//! management as an external collaborator "assumed available as a
//! library." [`GitBackend`] is that library's seam: an object-safe trait
//! narrowed to exactly the operations the sync coordinator and compactor
//! need, backed in this crate by `git2`.

pub mod error;
pub mod git2_backend;

pub use error::GitError;
pub use git2_backend::Git2Backend;

use std::path::Path;

/// The git operations the sync pipeline depends on. Implementations may be
/// backed by libgit2 (the only backend shipped here) or a test double.
/// `Sync` is required (not just `Send`) because the scheduler's background
/// thread and the foreground `Store` share one instance through an `Arc`.
pub trait GitBackend: Send + Sync {
    /// Create the repository at `path` if `.git` is absent, with `branch`
    /// as the initial default branch. If `remote_url` is set, attach it as
    /// `origin` unless a remote by that name already exists.
    fn ensure_repo(&self, path: &Path, branch: &str, remote_url: Option<&str>) -> Result<(), GitError>;

    /// Ensure `branch` is checked out: use the local branch if present,
    /// else check it out from `origin/<branch>` if that exists, else
    /// create it locally.
    fn ensure_branch(&self, path: &Path, branch: &str) -> Result<(), GitError>;

    /// Fetch `origin/<branch>`, authenticating with `username`/`token` if
    /// provided (spec.md §6: the username/token pair is supplied to the
    /// transport "via an on-demand callback," not scoped to push alone).
    /// Implementations must surface a remote branch that doesn't exist yet
    /// as [`GitError::NotFound`].
    fn fetch_branch(&self, path: &Path, branch: &str, username: &str, token: Option<&str>) -> Result<(), GitError>;

    /// True if an `origin` remote is configured.
    fn is_remote_configured(&self, path: &Path) -> Result<bool, GitError>;

    /// List `data/*.json` file paths present in the tree at
    /// `origin/<branch>`. Returns an empty list if the ref doesn't exist.
    fn list_files_at_remote_branch(&self, path: &Path, branch: &str) -> Result<Vec<String>, GitError>;

    /// Read a blob's bytes at `origin/<branch>:<file_path>`. Returns `None`
    /// if the ref, path, or blob doesn't exist (callers treat this as an
    /// empty bucket).
    fn read_blob_at_remote_branch(&self, path: &Path, branch: &str, file_path: &str) -> Result<Option<Vec<u8>>, GitError>;

    /// Stage every changed path under the working tree (add modified/new,
    /// remove deleted) and commit with `message` under the fixed author
    /// identity if anything was staged. Returns whether a commit was made.
    fn stage_and_commit(&self, path: &Path, message: &str) -> Result<bool, GitError>;

    /// Force-push `branch` to `origin`, authenticating with
    /// `username`/`token` if provided.
    fn force_push(&self, path: &Path, branch: &str, username: &str, token: Option<&str>) -> Result<(), GitError>;

    /// Destroy and recreate `.git`, re-attaching `origin` if `remote_url`
    /// is set. Used by the compactor to flatten history.
    fn reinit_history(&self, path: &Path, branch: &str, remote_url: Option<&str>) -> Result<(), GitError>;
}
