//! Context windows around a highlighted line range.

use serde::{Deserialize, Serialize};

/// One line of a snippet window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetLine {
    pub line_number: usize, // 1-based
    pub content: String,
    pub highlight: bool,
}

/// Read-only view of a file window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub path: String,
    pub git_ref: String,
    pub highlight_start: usize, // as given, after clamping to >= 1
    pub highlight_end: usize,   // as given; < start means zero-width
    pub lines: Vec<SnippetLine>,
    pub start_line: usize, // 0 when the window is empty
    pub end_line: usize,   // 0 when the window is empty
    pub total_lines: usize,
}

impl Snippet {
    /// Whether the highlight is a zero-width insertion point
    pub fn is_degenerate(&self) -> bool {
        self.highlight_end < self.highlight_start
    }

    /// Highlighted lines joined with LF
    pub fn highlighted_text(&self) -> String {
        self.lines
            .iter()
            .filter(|l| l.highlight)
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build a snippet window around `highlight_start..=highlight_end`.
///
/// Pure function; never panics. A degenerate range (end < start) keeps the
/// window centered on `highlight_start` and highlights nothing.
pub fn build_snippet<S: AsRef<str>>(
    path: &str,
    git_ref: &str,
    lines: &[S],
    highlight_start: usize,
    highlight_end: usize,
    context_before: usize,
    context_after: usize,
) -> Snippet {
    let highlight_start = highlight_start.max(1);
    let degenerate = highlight_end < highlight_start;
    let total_lines = lines.len();

    let mut window = Vec::new();
    let (mut start_line, mut end_line) = (0, 0);

    if total_lines > 0 {
        let anchor = if degenerate {
            highlight_start
        } else {
            highlight_end
        };
        let start_index = (highlight_start - 1).saturating_sub(context_before);
        let end_index = (anchor - 1)
            .saturating_add(context_after)
            .min(total_lines - 1);

        if start_index <= end_index {
            for (idx, content) in lines
                .iter()
                .enumerate()
                .take(end_index + 1)
                .skip(start_index)
            {
                let line_number = idx + 1;
                let highlight =
                    !degenerate && line_number >= highlight_start && line_number <= highlight_end;
                window.push(SnippetLine {
                    line_number,
                    content: content.as_ref().to_string(),
                    highlight,
                });
            }
            start_line = start_index + 1;
            end_line = end_index + 1;
        }
    }

    Snippet {
        path: path.to_string(),
        git_ref: git_ref.to_string(),
        highlight_start,
        highlight_end,
        lines: window,
        start_line,
        end_line,
        total_lines,
    }
}
