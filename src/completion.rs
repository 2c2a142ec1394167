//! Shell completions for `rfx`.
//!
//! Scripts go to stdout with `--stdout`, otherwise into `--out-dir` under
//! the file name the shell expects (`rfx.bash`, `_rfx`, `rfx.fish`, ...).

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Generator;
use clap_complete::Shell as CompletionShell;

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "rfx";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// Completion script for `shell`
pub fn script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(CompletionShell::from(shell), &mut cmd, BIN_NAME, &mut buf);
    buf
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let shell: CompletionShell = args.shell.clone().into();
    let body = script(args.shell);

    if args.stdout {
        io::stdout()
            .write_all(&body)
            .context("write completion to stdout")?;
        return Ok(());
    }

    let dir: PathBuf = args
        .out_dir
        .ok_or_else(|| anyhow::anyhow!("--out-dir is required unless --stdout is set"))?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let path = dir.join(shell.file_name(BIN_NAME));
    fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;

    if !ctx.quiet {
        eprintln!("Wrote {shell} completion to {}", path.display());
    }
    Ok(())
}
