//! Newline layout detection and faithful re-serialization.
//!
//! Files are split into terminator-free lines for editing and joined back
//! with the convention the original content used:
//! - CRLF when the raw bytes contain `"\r\n"` anywhere, LF otherwise.
//! - A trailing terminator is re-added only if the original had one.
//! - Zero lines always render as the empty string.

use serde::{Deserialize, Serialize};

/// Line terminator style of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    #[default]
    Lf,
    Crlf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::Crlf => "\r\n",
        }
    }
}

/// Newline convention captured from a file before editing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextLayout {
    pub newline: Newline,
    pub trailing_newline: bool,
}

impl TextLayout {
    /// Detect the layout of raw file content.
    pub fn detect(content: &str) -> Self {
        let newline = if memchr::memmem::find(content.as_bytes(), b"\r\n").is_some() {
            Newline::Crlf
        } else {
            Newline::Lf
        };
        Self {
            newline,
            trailing_newline: content.ends_with('\n'),
        }
    }

    /// Join lines back into file content using this layout.
    pub fn render<S: AsRef<str>>(&self, lines: &[S]) -> String {
        if lines.is_empty() {
            return String::new();
        }
        let nl = self.newline.as_str();
        let mut out = lines
            .iter()
            .map(|l| l.as_ref())
            .collect::<Vec<_>>()
            .join(nl);
        if self.trailing_newline {
            out.push_str(nl);
        } else if out.ends_with(nl) {
            // A final empty line would otherwise read back as a terminator
            out.truncate(out.len() - nl.len());
        }
        out
    }
}

/// Split file content into lines without their terminators.
pub fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

/// Parse and re-layout in one step.
pub fn parse(content: &str) -> (TextLayout, Vec<String>) {
    (TextLayout::detect(content), split_lines(content))
}

/// Normalize CRLF to LF.
pub fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n")
}

/// Split LF-joined block text back into exactly `expected_lines` lines.
///
/// Needed because `""` is both "no lines" and "one blank line"; the
/// recorded range length disambiguates.
pub fn split_block(text: &str, expected_lines: usize) -> Vec<String> {
    if expected_lines == 0 {
        return Vec::new();
    }
    text.split('\n').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_crlf_with_trailing_newline() {
        let layout = TextLayout::detect("a\r\nb\r\n");
        assert_eq!(layout.newline, Newline::Crlf);
        assert!(layout.trailing_newline);
    }

    #[test]
    fn detects_lf_without_trailing_newline() {
        let layout = TextLayout::detect("a\nb");
        assert_eq!(layout.newline, Newline::Lf);
        assert!(!layout.trailing_newline);
    }

    #[test]
    fn render_round_trips_layouts() {
        for content in ["a\nb\n", "a\nb", "a\r\nb\r\n", "a\r\nb", "x"] {
            let (layout, lines) = parse(content);
            assert_eq!(layout.render(&lines), content, "content {content:?}");
        }
    }

    #[test]
    fn render_empty_is_empty_string() {
        let layout = TextLayout {
            newline: Newline::Crlf,
            trailing_newline: true,
        };
        assert_eq!(layout.render::<String>(&[]), "");
    }

    #[test]
    fn render_keeps_final_blank_line_with_trailing_newline() {
        let (layout, lines) = parse("a\n\n");
        assert_eq!(lines, vec!["a".to_string(), String::new()]);
        assert_eq!(layout.render(&lines), "a\n\n");
    }

    #[test]
    fn split_block_preserves_single_blank_line() {
        assert_eq!(split_block("", 1), vec![String::new()]);
        assert!(split_block("", 0).is_empty());
        assert_eq!(split_block("a\n\nb", 3).len(), 3);
    }
}
