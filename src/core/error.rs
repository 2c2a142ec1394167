//! Error taxonomy for apply/undo operations.
//!
//! Every failure maps to an HTTP-shaped status (for the route layer that
//! embeds this crate) and to a CLI exit code (for `rfx`).

use crate::core::repo::RepoError;
use crate::core::undo_store::StoreError;

/// Invalid range handed to the splicer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range end {end} is before start {start}")]
    Inverted { start: usize, end: usize },
    #[error("range {start}-{end} exceeds {len} line(s)")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

/// Domain errors for the fix engine
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    /// Caller error; never retried
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Concurrency violation; caller must regenerate and retry explicitly
    #[error("conflict: {0}")]
    Conflict(String),

    /// Undo token unknown, expired or already consumed
    #[error("not found: {0}")]
    NotFound(String),

    /// Undo store required but unreachable
    #[error("undo store unavailable: {0}")]
    StoreUnavailable(String),

    /// Remote repository failure, status proxied when known
    #[error("upstream repository error: {message}")]
    Upstream { status: Option<u16>, message: String },
}

impl FixError {
    /// HTTP-shaped status code for this error
    pub fn status(&self) -> u16 {
        match self {
            FixError::InvalidRange(_) => 400,
            FixError::NotFound(_) => 404,
            FixError::Conflict(_) => 409,
            FixError::StoreUnavailable(_) => 503,
            FixError::Upstream { status, .. } => match status {
                Some(s) if *s >= 500 => *s,
                Some(_) => 502,
                None => 500,
            },
        }
    }

    /// Exit code for the CLI harness
    /// 2=conflict, 3=invalid range, 4=not found, 5=store, 6=upstream
    pub fn exit_code(&self) -> i32 {
        match self {
            FixError::Conflict(_) => 2,
            FixError::InvalidRange(_) => 3,
            FixError::NotFound(_) => 4,
            FixError::StoreUnavailable(_) => 5,
            FixError::Upstream { .. } => 6,
        }
    }
}

impl From<RangeError> for FixError {
    fn from(e: RangeError) -> Self {
        FixError::InvalidRange(e.to_string())
    }
}

impl From<RepoError> for FixError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::ParentMismatch { branch, .. } => FixError::Conflict(format!(
                "branch {branch} advanced before the commit could be written"
            )),
            RepoError::NotFound(what) => FixError::Upstream {
                status: Some(404),
                message: format!("not found: {what}"),
            },
            RepoError::Upstream { status, message } => FixError::Upstream { status, message },
        }
    }
}

impl From<StoreError> for FixError {
    fn from(e: StoreError) -> Self {
        FixError::StoreUnavailable(e.to_string())
    }
}

/// Convert a top-level error to an exit code
pub fn exit_code_for(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<FixError>()
        .map(FixError::exit_code)
        .unwrap_or(1)
}
