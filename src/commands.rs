//! CLI command handlers: wire config, repository and undo store into the
//! engine, then render results as text or JSON.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{AppContext, ApplyArgs, PurgeArgs, SnippetArgs, UndoArgs};
use crate::core::apply::{ApplyRequest, ApplyResult};
use crate::core::engine::{FixEngine, MergeRequestTarget};
use crate::core::error::FixError;
use crate::core::git::GitRepository;
use crate::core::snippet::Snippet;
use crate::core::undo::UndoResult;
use crate::core::undo_store::{FileUndoStore, MemoryUndoStore, UndoStore};
use crate::infra::config::{Config, UndoBackend, load_config};

fn open_repository(cfg: &Config) -> Result<GitRepository> {
    GitRepository::new(cfg.git_options())
        .map_err(FixError::from)
        .context("Failed to initialize git repository client")
}

fn open_store(cfg: &Config) -> Result<Box<dyn UndoStore>> {
    match cfg.undo.backend {
        UndoBackend::File => {
            let store = FileUndoStore::open(&cfg.undo.store_dir)
                .map_err(FixError::from)
                .with_context(|| {
                    format!("Failed to open undo store at {}", cfg.undo.store_dir.display())
                })?;
            Ok(Box::new(store))
        }
        UndoBackend::Memory => {
            warn!("memory undo backend: tokens do not outlive this process");
            Ok(Box::new(MemoryUndoStore::new(cfg.undo.max_entries)))
        }
    }
}

/// Read a file argument, `-` meaning stdin
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn snippet(args: SnippetArgs, ctx: &AppContext) -> Result<()> {
    let cfg = load_config(ctx.config.as_deref())?;
    let repo = open_repository(&cfg)?;

    let mut options = cfg.fix_options();
    if let Some(before) = args.before {
        options.context_before = before;
    }
    if let Some(after) = args.after {
        options.context_after = after;
    }
    let engine = FixEngine::new(&repo).with_options(options);

    let snippet = engine.snippet(&args.project, &args.path, &args.git_ref, args.start, args.end)?;
    if ctx.json() {
        return emit_json(&snippet);
    }
    print_snippet(&snippet, ctx);
    Ok(())
}

pub fn apply(args: ApplyArgs, ctx: &AppContext) -> Result<()> {
    if args.original == Path::new("-") && args.updated == Path::new("-") {
        anyhow::bail!("--original and --updated cannot both read stdin");
    }
    let original_code = read_input(&args.original)?;
    let updated_code = read_input(&args.updated)?;

    let cfg = load_config(ctx.config.as_deref())?;
    let repo = open_repository(&cfg)?;
    // Dry runs never write a record, so they do not need a store
    let store = if ctx.dry_run {
        None
    } else {
        match open_store(&cfg) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "undo store unavailable");
                None
            }
        }
    };
    let mut engine = FixEngine::new(&repo).with_options(cfg.fix_options());
    if let Some(store) = store.as_deref() {
        engine = engine.with_store(store);
    }

    let request = ApplyRequest {
        target: target(&args.target),
        file_path: args.path,
        git_ref: args.git_ref,
        start_line: args.start,
        end_line: args.end,
        original_code,
        updated_code,
        commit_message: args.message,
        dry_run: ctx.dry_run,
    };
    let result = engine.apply(&request)?;
    info!(commit = ?result.commit_sha, "apply finished");

    if ctx.json() {
        return emit_json(&result);
    }
    print_apply(&result, ctx);
    Ok(())
}

pub fn undo(args: UndoArgs, ctx: &AppContext) -> Result<()> {
    let cfg = load_config(ctx.config.as_deref())?;
    let store = open_store(&cfg)?;
    let repo = open_repository(&cfg)?;
    let engine = FixEngine::new(&repo)
        .with_options(cfg.fix_options())
        .with_store(&*store);

    let result = engine.undo(&target(&args.target), &args.token)?;
    if ctx.json() {
        return emit_json(&result);
    }
    print_undo(&result, ctx);
    Ok(())
}

#[derive(Serialize)]
struct PurgeReport {
    store_dir: String,
    removed: usize,
}

pub fn purge(args: PurgeArgs, ctx: &AppContext) -> Result<()> {
    let cfg = load_config(ctx.config.as_deref())?;
    let dir = args.store_dir.unwrap_or(cfg.undo.store_dir);
    let store = FileUndoStore::open(&dir)
        .map_err(FixError::from)
        .with_context(|| format!("Failed to open undo store at {}", dir.display()))?;
    let removed = store.purge_expired().map_err(FixError::from)?;

    let report = PurgeReport {
        store_dir: dir.display().to_string(),
        removed,
    };
    if ctx.json() {
        return emit_json(&report);
    }
    if !ctx.quiet {
        println!("Removed {} expired undo record(s) from {}", report.removed, report.store_dir);
    }
    Ok(())
}

fn target(args: &crate::cli::TargetArgs) -> MergeRequestTarget {
    MergeRequestTarget {
        project: args.project.clone(),
        merge_request: args.merge_request.clone(),
        source_branch: args.branch.clone(),
    }
}

fn print_snippet(snippet: &Snippet, ctx: &AppContext) {
    let width = snippet.end_line.max(1).to_string().len();
    println!("{} @ {}", snippet.path, short(&snippet.git_ref));
    for line in &snippet.lines {
        let gutter = format!("{:>width$}", line.line_number);
        match (line.highlight, ctx.no_color) {
            (true, false) => println!("{} > {}", gutter.yellow(), line.content.bold()),
            (true, true) => println!("{gutter} > {}", line.content),
            (false, false) => println!("{} | {}", gutter.dimmed(), line.content),
            (false, true) => println!("{gutter} | {}", line.content),
        }
    }
    if snippet.is_degenerate() {
        println!("(insertion point before line {})", snippet.highlight_start);
    }
}

/// Role of one rendered diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffLine {
    Header,
    Hunk,
    Added,
    Removed,
    Context,
}

/// Classify diff lines; `---`/`+++` are file headers only before the first hunk.
fn classify_diff(diff: &str) -> Vec<(DiffLine, &str)> {
    let mut in_hunk = false;
    diff.lines()
        .map(|line| {
            let kind = if line.starts_with("@@") {
                in_hunk = true;
                DiffLine::Hunk
            } else if !in_hunk {
                DiffLine::Header
            } else if line.starts_with('+') {
                DiffLine::Added
            } else if line.starts_with('-') {
                DiffLine::Removed
            } else {
                DiffLine::Context
            };
            (kind, line)
        })
        .collect()
}

fn print_diff(diff: &str, ctx: &AppContext) {
    if diff.is_empty() {
        println!("(no changes)");
        return;
    }
    for (kind, line) in classify_diff(diff) {
        if ctx.no_color {
            println!("{line}");
            continue;
        }
        match kind {
            DiffLine::Header => println!("{}", line.bold()),
            DiffLine::Hunk => println!("{}", line.cyan()),
            DiffLine::Added => println!("{}", line.green()),
            DiffLine::Removed => println!("{}", line.red()),
            DiffLine::Context => println!("{line}"),
        }
    }
}

fn print_apply(result: &ApplyResult, ctx: &AppContext) {
    print_diff(&result.diff, ctx);
    if ctx.quiet {
        return;
    }
    println!();
    match &result.commit_sha {
        Some(sha) => println!("Committed {} \"{}\"", short(sha), result.commit_message),
        None => println!("Dry run: would commit \"{}\"", result.commit_message),
    }
    println!(
        "Updated lines {}-{}",
        result.updated_start_line, result.updated_end_line
    );
    match (&result.undo_token, result.dry_run) {
        (Some(token), _) => println!("Undo token: {token}"),
        (None, false) => println!("Undo unavailable for this fix"),
        (None, true) => {}
    }
}

fn print_undo(result: &UndoResult, ctx: &AppContext) {
    print_diff(&result.diff, ctx);
    if !ctx.quiet {
        println!();
        println!(
            "Committed {} \"{}\"",
            short(&result.commit_sha),
            result.commit_message
        );
    }
}

fn short(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}
