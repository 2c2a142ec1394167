//! Apply a reviewed replacement to a merge request's source branch.
//!
//! Flow: fetch → verify → splice → (dry-run preview | commit → record undo).
//! Any failure up to and including the commit leaves the branch untouched.
//! Failing to record the undo never fails an apply that already committed.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::diff::unified_diff;
use crate::core::engine::{FixEngine, MergeRequestTarget};
use crate::core::error::FixError;
use crate::core::guard::{self, CheckPhase};
use crate::core::record::{self, UndoRecord};
use crate::core::repo::FileUpdate;
use crate::core::snippet::{Snippet, build_snippet};
use crate::core::splice::{inserted_range, splice};
use crate::infra::text::{self, normalize_newlines};

/// Apply request as received from the review UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub target: MergeRequestTarget,
    pub file_path: String,
    /// Commit the edit context was captured at
    pub git_ref: String,
    pub start_line: usize, // 1-based inclusive
    pub end_line: usize,   // 1-based inclusive
    pub original_code: String,
    pub updated_code: String,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Outcome of a committed or previewed apply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub diff: String,
    pub commit_message: String,
    pub commit_sha: Option<String>,
    pub snippet: Snippet,
    pub undo_token: Option<String>,
    pub updated_start_line: usize,
    pub updated_end_line: usize,
    pub dry_run: bool,
}

/// Default commit message for an applied suggestion
pub fn default_commit_message(path: &str, start_line: usize, end_line: usize) -> String {
    format!("fix: apply review suggestion to `{path}:{start_line}-{end_line}`")
}

impl FixEngine<'_> {
    /// Apply `request.updated_code` over `start_line..=end_line`.
    #[instrument(
        skip(self, request),
        fields(
            path = %request.file_path,
            branch = %request.target.source_branch,
            start = request.start_line,
            end = request.end_line,
            dry_run = request.dry_run
        )
    )]
    pub fn apply(&self, request: &ApplyRequest) -> Result<ApplyResult, FixError> {
        let target = &request.target;
        let path = request.file_path.as_str();
        let (start, end) = (request.start_line, request.end_line);
        if start == 0 || end < start {
            return Err(FixError::InvalidRange(format!(
                "lines {start}-{end} are not a valid 1-based range"
            )));
        }

        // Fetch the branch tip
        let head = self
            .repo
            .branch_head(&target.project, &target.source_branch)?;
        let before = self.repo.file_content(&target.project, path, &head)?;
        let (layout, lines) = text::parse(&before);

        // Verify nothing moved since the suggestion was generated
        guard::check_branch(&target.source_branch, &request.git_ref, &head)?;
        guard::check_block(
            path,
            &lines,
            start,
            end,
            &normalize_newlines(&request.original_code),
            CheckPhase::Apply,
        )?;

        // Splice and re-serialize with the file's own newline layout
        let replacement = text::split_lines(&request.updated_code);
        let spliced = splice(&lines, start - 1, end - 1, &replacement)?;
        let after = layout.render(&spliced);

        // Locate the replacement in what will actually be written
        let after_lines = text::split_lines(&after);
        let (updated_start, updated_end) = inserted_range(start, replacement.len());
        let updated_end = updated_end.min(after_lines.len());
        let updated_start = updated_start.min(updated_end + 1);

        let diff = unified_diff(path, &before, &after, self.options.diff_context);
        let commit_message = request
            .commit_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_commit_message(path, start, end));

        if request.dry_run {
            info!("dry run; nothing committed");
            return Ok(ApplyResult {
                diff,
                commit_message,
                commit_sha: None,
                snippet: self.post_edit_snippet(path, &head, &after_lines, updated_start, updated_end),
                undo_token: None,
                updated_start_line: updated_start,
                updated_end_line: updated_end,
                dry_run: true,
            });
        }

        // Conditional write: the remote refuses if the head moved since the fetch
        let commit_sha = self.repo.commit_file_update(&FileUpdate {
            project: &target.project,
            branch: &target.source_branch,
            path,
            content: &after,
            expected_parent: &head,
            message: &commit_message,
        })?;
        info!(%commit_sha, parent = %head, "committed fix");

        let record = UndoRecord {
            project_ref: target.project.clone(),
            mr_ref: target.merge_request.clone(),
            branch: target.source_branch.clone(),
            file_path: path.to_string(),
            start_line: start,
            end_line: end,
            updated_start_line: updated_start,
            updated_end_line: updated_end,
            original_code: lines[start - 1..end].join("\n"),
            updated_code: after_lines[updated_start - 1..updated_end].join("\n"),
            previous_commit_id: head,
            applied_commit_id: Some(commit_sha.clone()),
            layout,
            created_at: record::timestamp(),
        };
        let undo_token = self.record_undo(&record);

        Ok(ApplyResult {
            diff,
            commit_message,
            snippet: self.post_edit_snippet(path, &commit_sha, &after_lines, updated_start, updated_end),
            commit_sha: Some(commit_sha),
            undo_token,
            updated_start_line: updated_start,
            updated_end_line: updated_end,
            dry_run: false,
        })
    }

    /// Persist `record` under a fresh token. Store problems are logged and
    /// yield `None`; the edit is already committed at this point.
    fn record_undo(&self, record: &UndoRecord) -> Option<String> {
        let Some(store) = self.store else {
            warn!("no undo store configured; fix applied without undo capability");
            return None;
        };

        let value = match serde_json::to_string(record) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to serialize undo record");
                return None;
            }
        };

        let token = record::generate_token();
        match store.set(&record::store_key(&token), &value, self.options.undo_ttl) {
            Ok(()) => Some(token),
            Err(e) => {
                warn!(error = %e, "undo store unavailable; fix applied without undo capability");
                None
            }
        }
    }

    fn post_edit_snippet(
        &self,
        path: &str,
        git_ref: &str,
        lines: &[String],
        start: usize,
        end: usize,
    ) -> Snippet {
        build_snippet(
            path,
            git_ref,
            lines,
            start,
            end,
            self.options.context_before,
            self.options.context_after,
        )
    }
}
