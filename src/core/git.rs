//! Repository client backed by the `git` executable.
//!
//! Serves projects stored as (bare or non-bare) repositories under a root
//! directory. Commits are built with plumbing only, so no working tree or
//! checked-out index is ever touched:
//! 1. `hash-object -w` the new content;
//! 2. `read-tree` the parent into a throwaway index (`GIT_INDEX_FILE`);
//! 3. `update-index --cacheinfo` the new blob, `write-tree`;
//! 4. `commit-tree -p <parent>`;
//! 5. `update-ref refs/heads/<branch> <new> <parent>`.
//!
//! Step 5 is git's own compare-and-swap under the ref lock, which gives the
//! conditional-write semantics the engine relies on.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, instrument};

use crate::core::repo::{FileUpdate, RepoError, RepositoryClient};

const DEFAULT_FILE_MODE: &str = "100644";

/// Git client configuration
#[derive(Debug, Clone)]
pub struct GitOptions {
    /// Directory holding one repository per project (`.` = the root itself)
    pub root: PathBuf,
    pub git_executable: PathBuf,
    pub committer_name: String,
    pub committer_email: String,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            git_executable: PathBuf::from("git"),
            committer_name: "reviewfix".to_string(),
            committer_email: "reviewfix@localhost".to_string(),
        }
    }
}

/// `RepositoryClient` over local git repositories
#[derive(Debug, Clone)]
pub struct GitRepository {
    options: GitOptions,
}

impl GitRepository {
    /// Create a client, failing early when git cannot be executed.
    pub fn new(options: GitOptions) -> Result<Self, RepoError> {
        let output = Command::new(&options.git_executable)
            .arg("--version")
            .output()
            .map_err(|e| RepoError::Upstream {
                status: None,
                message: format!(
                    "git executable {} not usable: {e}",
                    options.git_executable.display()
                ),
            })?;
        let version = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || !version.contains("git version") {
            return Err(RepoError::Upstream {
                status: None,
                message: format!("unexpected git version output: {}", version.trim()),
            });
        }
        debug!(version = %version.trim(), "git detected");
        Ok(Self { options })
    }

    pub fn options(&self) -> &GitOptions {
        &self.options
    }

    fn repo_dir(&self, project: &str) -> Result<PathBuf, RepoError> {
        let project = project.trim();
        let dir = if project.is_empty() || project == "." {
            self.options.root.clone()
        } else {
            // Projects are plain sub-directories; refuse anything that escapes the root
            if Path::new(project)
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)))
            {
                return Err(RepoError::NotFound(format!("project {project}")));
            }
            self.options.root.join(project)
        };
        if !dir.is_dir() {
            return Err(RepoError::NotFound(format!("project {project}")));
        }
        Ok(dir)
    }

    /// Run git in `dir`, optionally feeding stdin.
    fn run(
        &self,
        dir: &Path,
        args: &[&str],
        envs: &[(&str, &OsStr)],
        stdin: Option<&[u8]>,
    ) -> Result<Output, RepoError> {
        let mut cmd = Command::new(&self.options.git_executable);
        cmd.current_dir(dir)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in envs {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|e| upstream(args, &e.to_string()))?;
        if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(bytes)
                .map_err(|e| upstream(args, &e.to_string()))?;
        }
        child
            .wait_with_output()
            .map_err(|e| upstream(args, &e.to_string()))
    }

    /// Run git and return trimmed stdout, mapping failure to `Upstream`.
    fn run_ok(
        &self,
        dir: &Path,
        args: &[&str],
        envs: &[(&str, &OsStr)],
        stdin: Option<&[u8]>,
    ) -> Result<String, RepoError> {
        let output = self.run(dir, args, envs, stdin)?;
        if !output.status.success() {
            return Err(upstream(args, &String::from_utf8_lossy(&output.stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Mode of `path` in `commit`, defaulting to a regular file
    fn file_mode(&self, dir: &Path, commit: &str, path: &str) -> Result<String, RepoError> {
        let listing = self.run_ok(dir, &["ls-tree", commit, "--", path], &[], None)?;
        Ok(listing
            .split_whitespace()
            .next()
            .filter(|mode| mode.starts_with("100"))
            .unwrap_or(DEFAULT_FILE_MODE)
            .to_string())
    }
}

fn upstream(args: &[&str], detail: &str) -> RepoError {
    RepoError::Upstream {
        status: None,
        message: format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            detail.trim()
        ),
    }
}

/// Whether git's stderr reports a missing ref, object or path
fn is_missing_object(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    ["invalid object name", "not a valid object name", "does not exist", "but not in"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

impl RepositoryClient for GitRepository {
    #[instrument(skip(self), level = "debug")]
    fn file_content(&self, project: &str, path: &str, git_ref: &str) -> Result<String, RepoError> {
        let dir = self.repo_dir(project)?;
        let object = format!("{git_ref}:{path}");
        let output = self.run(&dir, &["cat-file", "blob", &object], &[], None)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_object(&stderr) {
                return Err(RepoError::NotFound(format!("{path} at {git_ref}")));
            }
            return Err(upstream(&["cat-file"], &stderr));
        }
        String::from_utf8(output.stdout).map_err(|_| RepoError::Upstream {
            status: Some(415),
            message: format!("{path} at {git_ref} is not UTF-8 text"),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn branch_head(&self, project: &str, branch: &str) -> Result<String, RepoError> {
        let dir = self.repo_dir(project)?;
        let spec = format!("refs/heads/{branch}^{{commit}}");
        let output = self.run(&dir, &["rev-parse", "--verify", "--quiet", &spec], &[], None)?;
        if !output.status.success() {
            return Err(RepoError::NotFound(format!("branch {branch} in {project}")));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    #[instrument(
        skip(self, update),
        fields(project = update.project, branch = update.branch, path = update.path)
    )]
    fn commit_file_update(&self, update: &FileUpdate<'_>) -> Result<String, RepoError> {
        let dir = self.repo_dir(update.project)?;
        let parent = update.expected_parent;

        // Throwaway index so the repository's own index is never touched
        let scratch = tempfile::tempdir().map_err(|e| upstream(&["tempdir"], &e.to_string()))?;
        let index = scratch.path().join("index");
        let index_env = [("GIT_INDEX_FILE", index.as_os_str())];

        let blob = self.run_ok(
            &dir,
            &["hash-object", "-w", "--no-filters", "--stdin"],
            &[],
            Some(update.content.as_bytes()),
        )?;

        let read_tree = self.run(&dir, &["read-tree", parent], &index_env, None)?;
        if !read_tree.status.success() {
            return Err(RepoError::NotFound(format!("commit {parent}")));
        }

        let mode = self.file_mode(&dir, parent, update.path)?;
        let cacheinfo = format!("{mode},{blob},{}", update.path);
        self.run_ok(
            &dir,
            &["update-index", "--add", "--cacheinfo", &cacheinfo],
            &index_env,
            None,
        )?;
        let tree = self.run_ok(&dir, &["write-tree"], &index_env, None)?;

        let name = OsStr::new(&self.options.committer_name);
        let email = OsStr::new(&self.options.committer_email);
        let identity = [
            ("GIT_AUTHOR_NAME", name),
            ("GIT_AUTHOR_EMAIL", email),
            ("GIT_COMMITTER_NAME", name),
            ("GIT_COMMITTER_EMAIL", email),
        ];
        let commit = self.run_ok(
            &dir,
            &["commit-tree", &tree, "-p", parent, "-m", update.message],
            &identity,
            None,
        )?;

        // Compare-and-swap on the branch ref
        let ref_name = format!("refs/heads/{}", update.branch);
        let output = self.run(
            &dir,
            &["update-ref", "-m", update.message, &ref_name, &commit, parent],
            &[],
            None,
        )?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(stderr = %stderr.trim(), "update-ref refused");
            if stderr.contains("but expected") || stderr.contains("cannot lock ref") {
                return Err(RepoError::ParentMismatch {
                    branch: update.branch.to_string(),
                    expected: parent.to_string(),
                });
            }
            return Err(upstream(&["update-ref"], &stderr));
        }

        debug!(%commit, %tree, "branch updated");
        Ok(commit)
    }
}
