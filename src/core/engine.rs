//! Fix engine shared state and the read-side snippet operation.
//!
//! `FixEngine` borrows a repository client and an optional undo store; the
//! apply and undo operations live in `core::apply` and `core::undo`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::error::FixError;
use crate::core::repo::{RepoError, RepositoryClient};
use crate::core::snippet::{Snippet, build_snippet};
use crate::core::undo_store::UndoStore;
use crate::infra::text::split_lines;

/// Default lifetime of an undo capability
pub const DEFAULT_UNDO_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Merge request context resolved by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestTarget {
    pub project: String,
    pub merge_request: String,
    pub source_branch: String,
}

/// Tunables for snippet windows, diffs and undo lifetime
#[derive(Debug, Clone)]
pub struct FixOptions {
    pub context_before: usize,
    pub context_after: usize,
    pub diff_context: usize,
    pub undo_ttl: Duration,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            context_before: 5,
            context_after: 5,
            diff_context: 3,
            undo_ttl: DEFAULT_UNDO_TTL,
        }
    }
}

/// Apply/undo engine over a repository client and an optional undo store
pub struct FixEngine<'a> {
    pub(crate) repo: &'a dyn RepositoryClient,
    pub(crate) store: Option<&'a dyn UndoStore>,
    pub(crate) options: FixOptions,
}

impl<'a> FixEngine<'a> {
    pub fn new(repo: &'a dyn RepositoryClient) -> Self {
        Self {
            repo,
            store: None,
            options: FixOptions::default(),
        }
    }

    pub fn with_store(mut self, store: &'a dyn UndoStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_options(mut self, options: FixOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FixOptions {
        &self.options
    }

    /// Fetch `path` at `git_ref` and build a highlighted window.
    ///
    /// A branch name is resolved to its head commit first so the returned
    /// snippet carries the exact commit a later apply must be checked against.
    #[instrument(skip(self), level = "debug")]
    pub fn snippet(
        &self,
        project: &str,
        path: &str,
        git_ref: &str,
        highlight_start: usize,
        highlight_end: usize,
    ) -> Result<Snippet, FixError> {
        let resolved = match self.repo.branch_head(project, git_ref) {
            Ok(head) => head,
            Err(RepoError::NotFound(_)) => git_ref.to_string(),
            Err(e) => return Err(e.into()),
        };
        debug!(%resolved, "resolved snippet ref");

        let content = self.repo.file_content(project, path, &resolved)?;
        let lines = split_lines(&content);
        Ok(build_snippet(
            path,
            &resolved,
            &lines,
            highlight_start,
            highlight_end,
            self.options.context_before,
            self.options.context_after,
        ))
    }
}
