//! Shared test utilities for integration tests
//!
//! Merge request fixtures, request builders and store doubles used across
//! multiple test files.

#![allow(dead_code)]

use std::process::Command;
use std::time::Duration;

use reviewfix::core::{ApplyRequest, MergeRequestTarget, StoreError, UndoStore};

pub const PROJECT: &str = "group/app";
pub const MR: &str = "42";
pub const BRANCH: &str = "feature/fix";

/// Target for the default fixture merge request
pub fn target() -> MergeRequestTarget {
    MergeRequestTarget {
        project: PROJECT.to_string(),
        merge_request: MR.to_string(),
        source_branch: BRANCH.to_string(),
    }
}

/// Build an apply request against `git_ref` for the default target.
pub fn request(
    path: &str,
    git_ref: &str,
    start: usize,
    end: usize,
    original: &str,
    updated: &str,
) -> ApplyRequest {
    ApplyRequest {
        target: target(),
        file_path: path.to_string(),
        git_ref: git_ref.to_string(),
        start_line: start,
        end_line: end,
        original_code: original.to_string(),
        updated_code: updated.to_string(),
        commit_message: None,
        dry_run: false,
    }
}

/// Store whose every call fails, as if the backing service were down
pub struct DownStore;

impl UndoStore for DownStore {
    fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Whether a usable `git` binary is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
