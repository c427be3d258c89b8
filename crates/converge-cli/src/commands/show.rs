//! Show command implementation

use converge_core::{Generation, SnapshotStore};
use serde_json::json;

use crate::context::Context;
use crate::error::{CliError, Result};

/// Run the show command
pub fn run_show(ctx: &Context, id: Option<u64>, json: bool) -> Result<()> {
    let store = ctx.store()?;
    let generation: Generation = match id {
        Some(id) => store.get(id)?,
        None => store
            .latest()?
            .ok_or_else(|| CliError::user("No generations recorded yet"))?,
    };

    if json {
        let output = json!({
            "id": generation.id(),
            "timestamp": generation.timestamp().to_rfc3339(),
            "checksum": generation.checksum(),
            "tree": generation.tree().to_json(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", generation.tree());
    }
    Ok(())
}
