//! converge CLI
//!
//! Reconciles a system with desired state declared in fragment files.

mod cli;
mod commands;
mod context;
mod error;
mod hook;
mod settings;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::{Context, GlobalOptions};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = GlobalOptions {
        config: cli.config,
        state_dir: cli.state_dir,
        schema: cli.schema,
        global_config_dir: cli.global_config_dir,
    };

    match cli.command {
        Some(cmd) => execute_command(cmd, &options),
        None => {
            // No command provided - show help hint
            println!("{} declarative system reconciler", "converge".green().bold());
            println!();
            println!("Run {} for available commands.", "converge --help".cyan());
            Ok(())
        }
    }
}

/// Log to stderr so JSON on stdout stays clean. `RUST_LOG` applies unless
/// `--verbose` forces debug output.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
    if result.is_ok() {
        tracing::debug!("Verbose mode enabled");
    }
}

fn execute_command(cmd: Commands, options: &GlobalOptions) -> Result<()> {
    let cwd = std::env::current_dir()?;

    match cmd {
        Commands::Diff { fragments, json } => {
            let ctx = Context::load(&cwd, options, fragments)?;
            commands::run_diff(&ctx, json)
        }
        Commands::Apply {
            fragments,
            dry_run,
            json,
        } => {
            let ctx = Context::load(&cwd, options, fragments)?;
            commands::run_apply(&ctx, dry_run, json)
        }
        Commands::History { json } => {
            let ctx = Context::load(&cwd, options, Vec::new())?;
            commands::run_history(&ctx, json)
        }
        Commands::Show { id, json } => {
            let ctx = Context::load(&cwd, options, Vec::new())?;
            commands::run_show(&ctx, id, json)
        }
        Commands::Rollback { to } => {
            let ctx = Context::load(&cwd, options, Vec::new())?;
            commands::run_rollback(&ctx, to)
        }
        Commands::Verify => {
            let ctx = Context::load(&cwd, options, Vec::new())?;
            commands::run_verify(&ctx)
        }
        Commands::Completions { shell } => {
            commands::run_completions(shell);
            Ok(())
        }
    }
}
