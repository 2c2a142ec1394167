//! Reverse a previously applied fix.
//!
//! Stricter than apply: the branch must still be the merge request's source
//! branch, its head must still be the commit the fix produced, and the
//! replaced block must still read exactly as written.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::diff::unified_diff;
use crate::core::engine::{FixEngine, MergeRequestTarget};
use crate::core::error::FixError;
use crate::core::guard::{self, CheckPhase};
use crate::core::record::{self, UndoRecord};
use crate::core::repo::FileUpdate;
use crate::core::snippet::{Snippet, build_snippet};
use crate::core::splice::{insert_at, splice};
use crate::infra::text::{self, split_block};

/// Outcome of a successful undo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoResult {
    pub diff: String,
    pub commit_message: String,
    pub commit_sha: String,
    pub snippet: Snippet,
}

/// Commit message for a revert
pub fn revert_commit_message(path: &str) -> String {
    format!("revert: undo AI fix for `{path}`")
}

impl FixEngine<'_> {
    /// Undo the fix identified by `token` on `target`.
    #[instrument(skip(self, token), fields(branch = %target.source_branch))]
    pub fn undo(&self, target: &MergeRequestTarget, token: &str) -> Result<UndoResult, FixError> {
        let store = self
            .store
            .ok_or_else(|| FixError::StoreUnavailable("no undo store configured".to_string()))?;
        let key = record::store_key(token);

        let raw = store
            .get(&key)?
            .ok_or_else(|| FixError::NotFound("undo token is unknown or expired".to_string()))?;
        let entry: UndoRecord = serde_json::from_str(&raw).map_err(|e| {
            warn!(error = %e, "unreadable undo record");
            FixError::NotFound("undo token is unknown or expired".to_string())
        })?;

        // A token only works for the merge request it was issued for
        if entry.project_ref != target.project || entry.mr_ref != target.merge_request {
            debug!(project = %entry.project_ref, mr = %entry.mr_ref, "token issued for another merge request");
            return Err(FixError::NotFound(
                "undo token is unknown or expired".to_string(),
            ));
        }
        if entry.branch != target.source_branch {
            return Err(FixError::Conflict(format!(
                "branch changed since the fix was applied ({} is now {})",
                entry.branch, target.source_branch
            )));
        }

        let path = entry.file_path.as_str();
        let head = self.repo.branch_head(&entry.project_ref, &entry.branch)?;
        if let Some(applied) = entry.applied_commit_id.as_deref()
            && !guard::same_commit(applied, &head)
        {
            return Err(FixError::Conflict(format!(
                "new commits were pushed after the fix; undo unavailable (fix {applied}, head {head})"
            )));
        }

        let before = self.repo.file_content(&entry.project_ref, path, &head)?;
        let lines = text::split_lines(&before);
        guard::check_block(
            path,
            &lines,
            entry.updated_start_line,
            entry.updated_end_line,
            &entry.updated_code,
            CheckPhase::Undo,
        )?;

        // Put the original lines back where the replacement sits now
        let original = split_block(&entry.original_code, entry.original_len());
        let at0 = entry.updated_start_line - 1;
        let restored = if entry.updated_is_empty() {
            insert_at(&lines, at0, &original)?
        } else {
            splice(&lines, at0, entry.updated_end_line - 1, &original)?
        };
        let after = entry.layout.render(&restored);

        let diff = unified_diff(path, &before, &after, self.options.diff_context);
        let commit_message = revert_commit_message(path);
        let commit_sha = self.repo.commit_file_update(&FileUpdate {
            project: &entry.project_ref,
            branch: &entry.branch,
            path,
            content: &after,
            expected_parent: &head,
            message: &commit_message,
        })?;
        info!(
            %commit_sha,
            reverted = ?entry.applied_commit_id,
            restores = %entry.previous_commit_id,
            "reverted fix"
        );

        // One-shot: the token dies with a successful undo
        if let Err(e) = store.delete(&key) {
            warn!(error = %e, "failed to delete consumed undo record");
        }

        let restored_lines = text::split_lines(&after);
        let snippet = build_snippet(
            path,
            &commit_sha,
            &restored_lines,
            entry.start_line,
            entry.end_line,
            self.options.context_before,
            self.options.context_after,
        );

        Ok(UndoResult {
            diff,
            commit_message,
            commit_sha,
            snippet,
        })
    }
}
