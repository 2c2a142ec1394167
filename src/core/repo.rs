//! Remote repository client contract.
//!
//! The engine only needs three calls. `commit_file_update` must be a
//! conditional write: it fails with `ParentMismatch` when the branch head is
//! no longer `expected_parent`, which closes the window between the guard
//! check and the commit.

/// Request to replace one file's content with a new commit on a branch
#[derive(Debug, Clone)]
pub struct FileUpdate<'a> {
    pub project: &'a str,
    pub branch: &'a str,
    pub path: &'a str,
    pub content: &'a str,
    pub expected_parent: &'a str,
    pub message: &'a str,
}

/// Repository client failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepoError {
    /// Project, branch, ref or file does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Conditional write lost the race
    #[error("branch {branch} is no longer at {expected}")]
    ParentMismatch { branch: String, expected: String },

    /// Any other remote failure, with a status when the remote gave one
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },
}

/// Minimal repository API used by the fix engine
pub trait RepositoryClient {
    /// Full text of `path` at `git_ref` (commit id or branch name)
    fn file_content(&self, project: &str, path: &str, git_ref: &str) -> Result<String, RepoError>;

    /// Current head commit id of `branch`
    fn branch_head(&self, project: &str, branch: &str) -> Result<String, RepoError>;

    /// Commit `content` to `path` on top of `expected_parent`; returns the new commit id
    fn commit_file_update(&self, update: &FileUpdate<'_>) -> Result<String, RepoError>;
}
