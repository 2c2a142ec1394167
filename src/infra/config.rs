use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::engine::FixOptions;
use crate::core::git::GitOptions;

/// Config file names looked up in the working directory, first match wins
const CONFIG_FILES: [&str; 2] = ["reviewfix.toml", ".reviewfix.toml"];

/// Environment prefix; `REVIEWFIX__UNDO__TTL_SECS=60` sets `undo.ttl_secs`
const ENV_PREFIX: &str = "REVIEWFIX";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where project repositories live and who commits
    pub repository: RepositoryConfig,

    /// Snippet window around highlighted lines
    pub snippet: SnippetConfig,

    /// Unified diff rendering
    pub diff: DiffConfig,

    /// Undo record storage
    pub undo: UndoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub root: PathBuf,
    pub git_executable: PathBuf,
    pub committer_name: String,
    pub committer_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    pub context_before: usize,
    pub context_after: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub context_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoBackend {
    /// JSON records under `store_dir`, survive restarts
    File,
    /// Process-local cache
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    pub backend: UndoBackend,
    pub store_dir: PathBuf,
    pub ttl_secs: u64,
    pub max_entries: u64, // memory backend only
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        let git = GitOptions::default();
        Self {
            root: git.root,
            git_executable: git.git_executable,
            committer_name: git.committer_name,
            committer_email: git.committer_email,
        }
    }
}

impl Default for SnippetConfig {
    fn default() -> Self {
        let fix = FixOptions::default();
        Self {
            context_before: fix.context_before,
            context_after: fix.context_after,
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: FixOptions::default().diff_context,
        }
    }
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            backend: UndoBackend::File,
            store_dir: PathBuf::from(".reviewfix/undo"),
            ttl_secs: FixOptions::default().undo_ttl.as_secs(),
            max_entries: 10_000,
        }
    }
}

impl Config {
    /// Engine tunables derived from this config
    pub fn fix_options(&self) -> FixOptions {
        FixOptions {
            context_before: self.snippet.context_before,
            context_after: self.snippet.context_after,
            diff_context: self.diff.context_lines,
            undo_ttl: Duration::from_secs(self.undo.ttl_secs),
        }
    }

    pub fn git_options(&self) -> GitOptions {
        GitOptions {
            root: self.repository.root.clone(),
            git_executable: self.repository.git_executable.clone(),
            committer_name: self.repository.committer_name.clone(),
            committer_email: self.repository.committer_email.clone(),
        }
    }
}

/// Load configuration: defaults, then a config file, then `REVIEWFIX__*` env vars.
///
/// An explicit path must exist; otherwise the well-known file names are
/// looked up in the current directory.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut builder = config::Config::builder();

    match explicit {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            builder = builder.add_source(config::File::from(path));
        }
        None => {
            if let Some(found) = CONFIG_FILES.iter().map(Path::new).find(|p| p.exists()) {
                builder = builder.add_source(config::File::from(found));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder.build().context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(args: InitArgs, ctx: &AppContext) -> Result<()> {
    let config_path = args.path.join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run {
        print!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
