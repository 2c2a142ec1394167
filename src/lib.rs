//! **reviewfix** - Apply and undo AI-suggested code fixes on merge request branches
//!
//! Every write is guarded twice: the branch head and the exact replaced lines must match
//! what the suggestion was generated against, and the commit itself is conditional on the
//! expected parent. Each apply hands back a one-shot undo token.

/// Command-line interface with clap integration
pub mod cli;

/// CLI command handlers
pub mod commands;

/// Shell completion generation
pub mod completion;

/// Core engine - snippet, splice, diff, guard, apply and undo
pub mod core {
    /// Typed errors with HTTP-shaped statuses and CLI exit codes
    pub mod error;
    pub use error::{FixError, RangeError, exit_code_for};

    /// Highlighted context windows
    pub mod snippet;
    pub use snippet::{Snippet, SnippetLine, build_snippet};

    /// Line-range replacement
    pub mod splice;

    /// Unified diffs between file versions
    pub mod diff;
    pub use diff::unified_diff;

    /// Optimistic concurrency checks
    pub mod guard;

    /// Repository client seam
    pub mod repo;
    pub use repo::{FileUpdate, RepoError, RepositoryClient};

    /// `git` executable adapter (plumbing only, ref compare-and-swap)
    pub mod git;
    pub use git::{GitOptions, GitRepository};

    /// In-process repository for tests and embedding
    pub mod memory_repo;
    pub use memory_repo::MemoryRepository;

    /// Undo record storage with TTL (moka and file backends)
    pub mod undo_store;
    pub use undo_store::{FileUndoStore, MemoryUndoStore, StoreError, UndoStore};

    /// Undo records and tokens
    pub mod record;
    pub use record::UndoRecord;

    /// Engine state and the snippet operation
    pub mod engine;
    pub use engine::{FixEngine, FixOptions, MergeRequestTarget};

    /// Apply operation
    pub mod apply;
    pub use apply::{ApplyRequest, ApplyResult};

    /// Undo operation
    pub mod undo;
    pub use undo::UndoResult;
}

/// Infrastructure - configuration and newline-faithful text handling
pub mod infra {
    /// Configuration management with TOML files and environment overrides
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Line splitting and newline layout
    pub mod text;
    pub use text::TextLayout;
}

// Re-exports for library consumers
pub use cli::{AppContext, Cli, Commands};
pub use core::{
    ApplyRequest, ApplyResult, FixEngine, FixError, FixOptions, GitRepository, MemoryRepository,
    MemoryUndoStore, MergeRequestTarget, RepositoryClient, Snippet, UndoResult, UndoStore,
};
pub use infra::{Config, load_config};
