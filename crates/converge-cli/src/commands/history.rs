//! History command implementation

use colored::Colorize;
use converge_core::SnapshotStore;
use serde_json::json;

use crate::context::Context;
use crate::error::Result;

/// Run the history command
pub fn run_history(ctx: &Context, json: bool) -> Result<()> {
    let generations = ctx.store()?.list()?;

    if json {
        let entries: Vec<_> = generations
            .iter()
            .map(|g| {
                json!({
                    "id": g.id(),
                    "timestamp": g.timestamp().to_rfc3339(),
                    "checksum": g.checksum(),
                    "keys": g.tree().keys().collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if generations.is_empty() {
        println!("{} No generations recorded yet.", "note:".yellow().bold());
        return Ok(());
    }

    for generation in &generations {
        // sha256: plus 12 hex digits
        let checksum: String = generation.checksum().chars().take(19).collect();
        println!(
            "{:>6}  {}  {}  {}",
            generation.id().to_string().cyan(),
            generation.timestamp().format("%Y-%m-%d %H:%M:%S"),
            checksum.dimmed(),
            generation.tree().keys().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}
