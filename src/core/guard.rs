//! Optimistic concurrency guard.
//!
//! Two independent checks run before any mutation:
//! - branch identity: the branch head still equals the commit the caller saw;
//! - content identity: the target block still equals the text the caller saw.
//!
//! Either failing is a `Conflict`; nothing is retried or merged.

use tracing::debug;

use crate::core::error::FixError;
use crate::infra::text::normalize_newlines;

/// Content fingerprint (xxh64 of LF-normalized text)
pub type ContentId = String;

/// Shortest abbreviated commit id accepted as a head prefix
const MIN_ABBREV_LEN: usize = 7;

/// Deterministic fingerprint used in conflict messages and logs
pub fn fingerprint(content: &str) -> ContentId {
    let normalized = normalize_newlines(content);
    let h = xxhash_rust::xxh64::xxh64(normalized.as_bytes(), 0);
    format!("{:016x}", h)
}

/// Whether `expected` names the same commit as `actual`.
/// Abbreviated ids of at least seven characters match by prefix.
pub fn same_commit(expected: &str, actual: &str) -> bool {
    let expected = expected.trim();
    let actual = actual.trim();
    if expected.eq_ignore_ascii_case(actual) {
        return true;
    }
    expected.len() >= MIN_ABBREV_LEN
        && expected.len() < actual.len()
        && expected.chars().all(|c| c.is_ascii_hexdigit())
        && actual
            .get(..expected.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(expected))
}

/// Refuse when the branch head moved away from `expected`.
pub fn check_branch(branch: &str, expected: &str, actual_head: &str) -> Result<(), FixError> {
    if same_commit(expected, actual_head) {
        return Ok(());
    }
    debug!(branch, expected, actual_head, "branch head mismatch");
    Err(FixError::Conflict(format!(
        "branch {branch} advanced since the edit context was captured (expected {expected}, found {actual_head})"
    )))
}

/// Where a content check is running; decides how an out-of-range block is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Apply,
    Undo,
}

/// Refuse when `file_lines[start1..=end1]` differs from `expected`.
///
/// `expected` must already be LF-normalized and is compared with the lines
/// joined by `\n`. On apply, the block followed by one `\n` is accepted too,
/// so callers may send terminated text. An empty range
/// (`end1 == start1 - 1`) requires `start1 - 1 <= file_lines.len()`.
pub fn check_block<S: AsRef<str>>(
    path: &str,
    file_lines: &[S],
    start1: usize,
    end1: usize,
    expected: &str,
    phase: CheckPhase,
) -> Result<(), FixError> {
    let total = file_lines.len();
    let in_bounds = start1 >= 1 && end1 + 1 >= start1 && end1 <= total;
    if !in_bounds {
        let msg = format!("lines {start1}-{end1} are outside {path} ({total} line(s))");
        return Err(match phase {
            CheckPhase::Apply => FixError::InvalidRange(msg),
            CheckPhase::Undo => FixError::Conflict(format!(
                "target content changed since it was captured: {msg}"
            )),
        });
    }

    let actual = file_lines[start1 - 1..end1]
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");

    let terminated = phase == CheckPhase::Apply
        && expected.strip_suffix('\n') == Some(actual.as_str());
    if actual == expected || terminated {
        return Ok(());
    }

    let expected_cid = fingerprint(expected);
    let actual_cid = fingerprint(&actual);
    debug!(path, start1, end1, %expected_cid, %actual_cid, "block mismatch");
    Err(FixError::Conflict(format!(
        "target content changed since it was captured: {path}:{start1}-{end1} (expected {expected_cid}, found {actual_cid})"
    )))
}
