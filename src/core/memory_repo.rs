//! In-process repository with branch heads and immutable commits.
//!
//! Mirrors the conditional-write semantics of a hosted repository API so
//! the engines can be embedded or exercised without a network. Commit ids
//! are blake3 digests of parent, tree and message.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::core::repo::{FileUpdate, RepoError, RepositoryClient};

type Tree = BTreeMap<String, String>;

#[derive(Debug, Clone)]
struct Commit {
    tree: Tree,
}

/// Commit pushed by a concurrent writer right before the next conditional write
#[derive(Debug, Clone)]
struct PendingRace {
    project: String,
    branch: String,
    path: String,
    content: String,
}

#[derive(Debug, Default)]
struct State {
    commits: HashMap<String, Commit>,
    // (project, branch) -> head commit id
    heads: BTreeMap<(String, String), String>,
    commit_calls: usize,
    race: Option<PendingRace>,
}

/// Thread-safe in-memory repository
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a file directly to a branch, creating the branch if needed.
    /// Returns the new head. Not counted as a `commit_file_update` call.
    pub fn push_file(&self, project: &str, branch: &str, path: &str, content: &str) -> String {
        let mut state = self.lock();
        push_locked(&mut state, project, branch, path, content, "push")
    }

    /// Arrange for another writer to move `branch` just before the next
    /// `commit_file_update` runs its parent check.
    pub fn race_next_commit(&self, project: &str, branch: &str, path: &str, content: &str) {
        self.lock().race = Some(PendingRace {
            project: project.to_string(),
            branch: branch.to_string(),
            path: path.to_string(),
            content: content.to_string(),
        });
    }

    /// Number of `commit_file_update` calls received, successful or not
    pub fn commit_calls(&self) -> usize {
        self.lock().commit_calls
    }

    /// Content of `path` at the head of `branch`, if both exist
    pub fn head_content(&self, project: &str, branch: &str, path: &str) -> Option<String> {
        let state = self.lock();
        let head = state.heads.get(&key(project, branch))?;
        state.commits.get(head)?.tree.get(path).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a panicking test thread; the data is still usable
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn key(project: &str, branch: &str) -> (String, String) {
    (project.to_string(), branch.to_string())
}

fn commit_id(parent: Option<&str>, tree: &Tree, message: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(parent.unwrap_or("").as_bytes());
    for (path, content) in tree {
        hasher.update(path.as_bytes());
        hasher.update(&[0]);
        hasher.update(content.as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(message.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..40].to_string()
}

fn push_locked(
    state: &mut State,
    project: &str,
    branch: &str,
    path: &str,
    content: &str,
    message: &str,
) -> String {
    let parent = state.heads.get(&key(project, branch)).cloned();
    let mut tree = parent
        .as_ref()
        .and_then(|p| state.commits.get(p))
        .map(|c| c.tree.clone())
        .unwrap_or_default();
    tree.insert(path.to_string(), content.to_string());

    let id = commit_id(parent.as_deref(), &tree, message);
    state.commits.insert(id.clone(), Commit { tree });
    state.heads.insert(key(project, branch), id.clone());
    id
}

impl RepositoryClient for MemoryRepository {
    fn file_content(&self, project: &str, path: &str, git_ref: &str) -> Result<String, RepoError> {
        let state = self.lock();
        let commit = state
            .heads
            .get(&key(project, git_ref))
            .and_then(|head| state.commits.get(head))
            .or_else(|| state.commits.get(git_ref))
            .ok_or_else(|| RepoError::NotFound(format!("ref {git_ref} in {project}")))?;
        commit
            .tree
            .get(path)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("{path} at {git_ref}")))
    }

    fn branch_head(&self, project: &str, branch: &str) -> Result<String, RepoError> {
        self.lock()
            .heads
            .get(&key(project, branch))
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("branch {branch} in {project}")))
    }

    fn commit_file_update(&self, update: &FileUpdate<'_>) -> Result<String, RepoError> {
        let mut state = self.lock();
        state.commit_calls += 1;

        if let Some(race) = state.race.take() {
            push_locked(
                &mut state,
                &race.project,
                &race.branch,
                &race.path,
                &race.content,
                "concurrent push",
            );
        }

        let head = state
            .heads
            .get(&key(update.project, update.branch))
            .cloned()
            .ok_or_else(|| {
                RepoError::NotFound(format!("branch {} in {}", update.branch, update.project))
            })?;
        if head != update.expected_parent {
            return Err(RepoError::ParentMismatch {
                branch: update.branch.to_string(),
                expected: update.expected_parent.to_string(),
            });
        }

        Ok(push_locked(
            &mut state,
            update.project,
            update.branch,
            update.path,
            update.content,
            update.message,
        ))
    }
}
