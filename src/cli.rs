use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: bool,  // global --verbose
    pub format: OutputFormat,
    pub config: Option<PathBuf>, // global --config
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            quiet: cli.quiet,
            no_color: cli.no_color,
            dry_run: cli.dry_run,
            verbose: cli.verbose,
            format: cli.format,
            config: cli.config.clone(),
        }
    }

    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

#[derive(Parser)]
#[command(name = "rfx")]
#[command(
    about = "Apply and undo AI-suggested fixes on merge request branches, safely under concurrent pushes"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without committing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log engine stages to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Config file (defaults to ./reviewfix.toml or ./.reviewfix.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with a colored diff
    Text,
    /// Single-line JSON
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a file window with highlighted lines
    Snippet(SnippetArgs),

    /// Apply a replacement to a line range on the source branch
    Apply(ApplyArgs),

    /// Revert a previously applied fix using its undo token
    Undo(UndoArgs),

    /// Remove expired undo records from the file store
    Purge(PurgeArgs),

    /// Initialize a reviewfix.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Merge request the operation targets
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Project (repository directory under the configured root)
    #[arg(long, default_value = ".")]
    pub project: String,

    /// Merge request identifier
    #[arg(long = "mr", value_name = "ID")]
    pub merge_request: String,

    /// Source branch of the merge request
    #[arg(long)]
    pub branch: String,
}

#[derive(Parser, Debug)]
pub struct SnippetArgs {
    /// Project (repository directory under the configured root)
    #[arg(long, default_value = ".")]
    pub project: String,

    /// Repository-relative file path
    #[arg(long)]
    pub path: String,

    /// Branch name or commit id
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: String,

    /// First highlighted line (1-based)
    #[arg(long)]
    pub start: usize,

    /// Last highlighted line (1-based, inclusive)
    #[arg(long)]
    pub end: usize,

    /// Lines of context before the highlight (overrides config)
    #[arg(long)]
    pub before: Option<usize>,

    /// Lines of context after the highlight (overrides config)
    #[arg(long)]
    pub after: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Repository-relative file path
    #[arg(long)]
    pub path: String,

    /// Commit the suggestion was generated against
    #[arg(long = "ref", value_name = "COMMIT")]
    pub git_ref: String,

    /// First replaced line (1-based)
    #[arg(long)]
    pub start: usize,

    /// Last replaced line (1-based, inclusive)
    #[arg(long)]
    pub end: usize,

    /// File holding the code the range is expected to contain ('-' for stdin)
    #[arg(long, value_name = "FILE")]
    pub original: PathBuf,

    /// File holding the replacement code ('-' for stdin)
    #[arg(long, value_name = "FILE")]
    pub updated: PathBuf,

    /// Commit message (defaults to a generated one)
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Parser, Debug)]
pub struct UndoArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Undo token returned by apply
    pub token: String,
}

#[derive(Parser, Debug)]
pub struct PurgeArgs {
    /// Store directory (overrides config)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
