//! Unified diff rendering for apply/undo previews.
//!
//! Presentation only: nothing here decides whether an edit is allowed.

use similar::TextDiff;

use crate::infra::text::normalize_newlines;

/// Render a git-style unified diff of `before` → `after` for `path`.
/// Line endings are normalized first so CRLF files do not show noise.
/// Identical content renders as an empty string.
pub fn unified_diff(path: &str, before: &str, after: &str, context_lines: usize) -> String {
    let before = normalize_newlines(before);
    let after = normalize_newlines(after);
    if before == after {
        return String::new();
    }

    let old_header = format!("a/{path}");
    let new_header = format!("b/{path}");
    let diff = TextDiff::from_lines(&before, &after);

    let mut output = format!("diff --git {old_header} {new_header}\n");
    output.push_str(
        &diff
            .unified_diff()
            .context_radius(context_lines)
            .header(&old_header, &new_header)
            .to_string(),
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_has_no_diff() {
        assert_eq!(unified_diff("a.rs", "x\n", "x\n", 3), "");
    }

    #[test]
    fn crlf_only_change_has_no_diff() {
        assert_eq!(unified_diff("a.rs", "x\r\ny\r\n", "x\ny\n", 3), "");
    }

    #[test]
    fn renders_git_headers_and_changes() {
        let diff = unified_diff("src/lib.rs", "a\nb\nc\n", "a\nB\nc\n", 3);
        assert!(diff.starts_with("diff --git a/src/lib.rs b/src/lib.rs\n"));
        assert!(diff.contains("--- a/src/lib.rs"));
        assert!(diff.contains("+++ b/src/lib.rs"));
        assert!(diff.contains("-b\n"));
        assert!(diff.contains("+B\n"));
    }

    #[test]
    fn snapshot_of_multi_line_replacement() {
        let diff = unified_diff("a.txt", "a\nb\nc\nd\n", "a\nB\nC\nC2\nd\n", 1);
        insta::assert_snapshot!(diff, @r"
        diff --git a/a.txt b/a.txt
        --- a/a.txt
        +++ b/a.txt
        @@ -1,4 +1,5 @@
         a
        -b
        -c
        +B
        +C
        +C2
         d
        ");
    }
}
