//! Rollback command implementation
//!
//! Reconciles back to the tree of an earlier generation. The result is a
//! new generation; history is append-only.

use colored::Colorize;
use converge_core::{Reconciler, SnapshotStore, Summary};

use super::print_changes;
use crate::context::Context;
use crate::error::{CliError, Result};

/// Run the rollback command
pub fn run_rollback(ctx: &Context, to: Option<u64>) -> Result<()> {
    let store = ctx.store()?;
    let latest = store
        .latest()?
        .ok_or_else(|| CliError::user("No generations recorded yet"))?;

    let target_id = match to {
        Some(id) => id,
        None if latest.id() > 1 => latest.id() - 1,
        None => {
            return Err(CliError::user(
                "Generation 1 is the only generation; nothing to roll back to",
            ));
        }
    };
    let target = store.get(target_id)?;
    tracing::info!(from = latest.id(), to = target_id, "rolling back");

    let mut reconciler = Reconciler::new(&store, ctx.executor());
    let outcome = reconciler.reconcile(target.tree())?;

    if outcome.changes.is_empty() {
        println!(
            "{} Generation {} already matches generation {}.",
            "OK".green().bold(),
            latest.id(),
            target_id
        );
        return Ok(());
    }

    print_changes(&outcome.changes);
    println!(
        "{} to generation {} ({}); recorded as generation {}.",
        "Rolled back".green().bold(),
        target_id,
        Summary::of(&outcome.changes),
        outcome.generation.id().to_string().cyan()
    );
    Ok(())
}
