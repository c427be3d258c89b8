//! Verify command implementation

use colored::Colorize;
use converge_core::SnapshotStore;

use crate::context::Context;
use crate::error::{CliError, Result};

/// Run the verify command
///
/// Fails when any stored generation does not match its checksum.
pub fn run_verify(ctx: &Context) -> Result<()> {
    let report = ctx.store()?.verify()?;

    if report.is_ok() {
        println!(
            "{} {} generation(s) verified.",
            "OK".green().bold(),
            report.checked
        );
        return Ok(());
    }

    for problem in &report.problems {
        println!("  {} {}", "!".red(), problem);
    }
    Err(CliError::user(format!(
        "{} problem(s) found in {} generation(s)",
        report.problems.len(),
        report.checked
    )))
}
