//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// converge - Reconcile a system with its declared state
#[derive(Parser, Debug)]
#[command(name = "converge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project settings file (default: ./converge.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the generation history
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Schema file declaring the fields fragments may set
    #[arg(long, global = true, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Directory of the global settings file
    #[arg(long, global = true, value_name = "DIR", env = "CONVERGE_CONFIG_DIR", hide = true)]
    pub global_config_dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Preview the changes apply would make
    Diff {
        /// Fragment files, merged in order (default: from settings)
        fragments: Vec<PathBuf>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Reconcile the system with the given fragments
    ///
    /// Examples:
    ///   converge apply base.toml host.toml   # Merge two fragments and apply
    ///   converge apply --dry-run             # Preview using configured fragments
    Apply {
        /// Fragment files, merged in order (default: from settings)
        fragments: Vec<PathBuf>,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List recorded generations
    History {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print the tree of a generation
    Show {
        /// Generation id (default: latest)
        id: Option<u64>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Reconcile back to the tree of an earlier generation
    ///
    /// The rollback is recorded as a new generation; history is never
    /// rewritten.
    Rollback {
        /// Generation to return to (default: the one before latest)
        #[arg(long, value_name = "ID")]
        to: Option<u64>,
    },

    /// Check every stored generation against its checksum
    Verify,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
