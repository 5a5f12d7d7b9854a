//! Errors returned by the [`super::GitBackend`] trait.

use thiserror::Error;

/// Errors from the git transport layer. All [`super::GitBackend`] methods
/// return this; callers match on specific variants (e.g. `NotFound`) instead
/// of parsing error messages where the spec calls for typed detection.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested ref, remote branch, or blob was not found. Used for the
    /// typed "remote branch absent" detection in the sync coordinator.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A push to the remote was rejected or failed outright.
    #[error("push to `{remote}` failed: {message}")]
    PushFailed { remote: String, message: String },

    /// An I/O error occurred (filesystem, process spawn, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying libgit2 backend returned an unclassified error.
    #[error("git backend error: {message}")]
    Backend { message: String },
}

impl GitError {
    /// True if this error (or, for the substring-fallback case mandated by
    /// the sync coordinator's recovery rule, its message) indicates the
    /// remote branch simply does not exist yet.
    #[must_use]
    pub fn is_remote_branch_absent(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            other => {
                let msg = other.to_string();
                msg.contains("NotFoundError") || msg.contains("not found")
            }
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(e: git2::Error) -> Self {
        if e.code() == git2::ErrorCode::NotFound {
            Self::NotFound { message: e.message().to_owned() }
        } else {
            Self::Backend { message: e.message().to_owned() }
        }
    }
}
