//! Line-range replacement with explicit post-edit bookkeeping.
//!
//! Replacements may change the line count, so the occupied range after an
//! edit is always recomputed from the replacement length.

use crate::core::error::RangeError;

/// Replace `file_lines[start0..=end0]` with `replacement`.
pub fn splice<S: Clone>(
    file_lines: &[S],
    start0: usize,
    end0: usize,
    replacement: &[S],
) -> Result<Vec<S>, RangeError> {
    if end0 < start0 {
        return Err(RangeError::Inverted {
            start: start0,
            end: end0,
        });
    }
    if end0 >= file_lines.len() {
        return Err(RangeError::OutOfBounds {
            start: start0,
            end: end0,
            len: file_lines.len(),
        });
    }

    let mut out = Vec::with_capacity(file_lines.len() - (end0 - start0 + 1) + replacement.len());
    out.extend_from_slice(&file_lines[..start0]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&file_lines[end0 + 1..]);
    Ok(out)
}

/// Insert `replacement` before `file_lines[at0]` (or at the end when `at0 == len`).
pub fn insert_at<S: Clone>(
    file_lines: &[S],
    at0: usize,
    replacement: &[S],
) -> Result<Vec<S>, RangeError> {
    if at0 > file_lines.len() {
        return Err(RangeError::OutOfBounds {
            start: at0,
            end: at0,
            len: file_lines.len(),
        });
    }

    let mut out = Vec::with_capacity(file_lines.len() + replacement.len());
    out.extend_from_slice(&file_lines[..at0]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&file_lines[at0..]);
    Ok(out)
}

/// 1-based range occupied by `replacement_len` lines inserted at `start1`.
/// Zero lines give `(start1, start1 - 1)`.
pub fn inserted_range(start1: usize, replacement_len: usize) -> (usize, usize) {
    (start1, start1 + replacement_len - 1)
}
