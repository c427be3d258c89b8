//! Diff command implementation
//!
//! Previews what apply would change without touching the system.

use colored::Colorize;
use converge_core::{Generation, SnapshotStore, Summary, diff};

use super::{changes_json, print_changes};
use crate::context::Context;
use crate::error::Result;

/// Run the diff command
pub fn run_diff(ctx: &Context, json: bool) -> Result<()> {
    let desired = ctx.desired()?;
    let store = ctx.store()?;
    let base = store.latest()?;
    let current = base.as_ref().map(Generation::tree).cloned().unwrap_or_default();
    let ops = diff(&current, &desired);

    if json {
        let mut output = changes_json(&ops);
        output["base"] = base.as_ref().map(Generation::id).into();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if ops.is_empty() {
        println!(
            "{} No changes needed. System is converged.",
            "OK".green().bold()
        );
        return Ok(());
    }

    let base_label = match &base {
        Some(generation) => format!("generation {}", generation.id()),
        None => "empty state".to_string(),
    };
    println!("{} against {}", "Diff".blue().bold(), base_label.cyan());
    println!();
    print_changes(&ops);
    println!();
    println!("{}", Summary::of(&ops));
    println!("Run {} to apply these changes.", "converge apply".cyan());
    Ok(())
}
