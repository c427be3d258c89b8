//! Command implementations for converge-cli

pub mod apply;
pub mod completions;
pub mod diff;
pub mod history;
pub mod rollback;
pub mod show;
pub mod verify;

pub use apply::run_apply;
pub use completions::run_completions;
pub use diff::run_diff;
pub use history::run_history;
pub use rollback::run_rollback;
pub use show::run_show;
pub use verify::run_verify;

use colored::Colorize;
use converge_core::{ChangeKind, ChangeOp, Summary};
use serde_json::json;

/// Print a changeset as colored diff lines.
pub(crate) fn print_changes(ops: &[ChangeOp]) {
    for op in ops {
        let line = op.to_string();
        let colored_line = match op.kind {
            ChangeKind::Add => line.green(),
            ChangeKind::Remove => line.red(),
            ChangeKind::Replace => line.yellow(),
        };
        println!("  {}", colored_line);
        if let Some(detail) = op.detail() {
            for detail_line in detail.lines() {
                println!("      {}", detail_line.dimmed());
            }
        }
    }
}

/// JSON body shared by `diff` and `apply --json`.
pub(crate) fn changes_json(ops: &[ChangeOp]) -> serde_json::Value {
    json!({
        "has_changes": !ops.is_empty(),
        "summary": Summary::of(ops),
        "changes": ops.iter().map(ChangeOp::json).collect::<Vec<_>>(),
    })
}
