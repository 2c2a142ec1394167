//! Undo records and their capability tokens.
//!
//! A record holds exactly what is needed to reverse one applied edit. It is
//! addressed only by a random token handed to the caller; nothing else
//! references it.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::infra::text::TextLayout;

/// Tokens are 32 symbols drawn from this 62-character alphabet (~190 bits)
const TOKEN_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 32;

/// State needed to reverse one applied edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRecord {
    pub project_ref: String,
    pub mr_ref: String,
    pub branch: String,
    pub file_path: String,
    pub start_line: usize, // original range, 1-based
    pub end_line: usize,
    pub updated_start_line: usize, // post-edit range; end < start means empty
    pub updated_end_line: usize,
    pub original_code: String, // LF-joined
    pub updated_code: String,  // LF-joined
    pub previous_commit_id: String,
    pub applied_commit_id: Option<String>,
    /// Newline layout of the file before the edit
    #[serde(default)]
    pub layout: TextLayout,
    pub created_at: String, // RFC3339
}

impl UndoRecord {
    /// Number of lines the original block occupied
    pub fn original_len(&self) -> usize {
        (self.end_line + 1).saturating_sub(self.start_line)
    }

    /// Whether the replacement removed every line of the range
    pub fn updated_is_empty(&self) -> bool {
        self.updated_end_line < self.updated_start_line
    }
}

/// Current time in the record timestamp format
pub fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Generate an unguessable, URL-safe undo token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TOKEN_ALPHABET.len());
            TOKEN_ALPHABET[idx] as char
        })
        .collect()
}

/// Store key for a token
pub fn store_key(token: &str) -> String {
    format!("undo:{token}")
}
