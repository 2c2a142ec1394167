use std::process::ExitCode;

use clap::Parser;
use reviewfix::cli::{AppContext, Cli, Commands};
use reviewfix::core::exit_code_for;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext::from_cli(&cli);
    init_tracing(&ctx);

    let result = match cli.command {
        Commands::Snippet(args) => reviewfix::commands::snippet(args, &ctx),
        Commands::Apply(args) => reviewfix::commands::apply(args, &ctx),
        Commands::Undo(args) => reviewfix::commands::undo(args, &ctx),
        Commands::Purge(args) => reviewfix::commands::purge(args, &ctx),
        Commands::Init(args) => reviewfix::infra::config::init(args, &ctx),
        Commands::Completions(args) => reviewfix::completion::run(args, &ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = exit_code_for(&e);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// `RUST_LOG` wins; otherwise `warn`, or `info` with --verbose.
fn init_tracing(ctx: &AppContext) {
    let default = if ctx.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!ctx.no_color)
        .with_target(false)
        .init();
}
