//! Apply command implementation

use colored::Colorize;
use converge_core::{Reconciler, SnapshotStore, Summary, diff};
use serde_json::json;

use super::{changes_json, print_changes};
use crate::context::Context;
use crate::error::Result;

/// Run the apply command
///
/// With `dry_run`, prints the changeset like `diff` and stops.
pub fn run_apply(ctx: &Context, dry_run: bool, json: bool) -> Result<()> {
    let desired = ctx.desired()?;
    let store = ctx.store()?;

    if dry_run {
        let current = store.latest()?.map(|g| g.into_tree()).unwrap_or_default();
        let ops = diff(&current, &desired);
        if json {
            let mut output = changes_json(&ops);
            output["dry_run"] = true.into();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if ops.is_empty() {
            println!("{} Nothing to do.", "[dry-run]".yellow());
        } else {
            println!("{} Would apply:", "[dry-run]".yellow());
            print_changes(&ops);
            println!("{}", Summary::of(&ops));
        }
        return Ok(());
    }

    let mut reconciler = Reconciler::new(&store, ctx.executor());
    let outcome = reconciler.reconcile(&desired)?;
    let generation = &outcome.generation;

    if json {
        let mut output = changes_json(&outcome.changes);
        output["generation"] = json!({
            "id": generation.id(),
            "timestamp": generation.timestamp().to_rfc3339(),
            "checksum": generation.checksum(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if outcome.changes.is_empty() {
        println!(
            "{} Already converged at generation {}.",
            "OK".green().bold(),
            generation.id()
        );
    } else {
        print_changes(&outcome.changes);
        println!(
            "{} {}; now at generation {}.",
            "Applied".green().bold(),
            Summary::of(&outcome.changes),
            generation.id().to_string().cyan()
        );
    }
    Ok(())
}
