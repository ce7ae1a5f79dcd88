//! List command implementation.

use super::CliResult;
use blockstore_backend::{BackendError, BlockBackend, Operation};
use std::io::Write;

/// Runs the list command.
///
/// Enumeration stops at the first failed write to `out`.
pub fn run(backend: &dyn BlockBackend, count_only: bool, out: &mut dyn Write) -> CliResult<()> {
    let mut count = 0usize;

    backend.foreach(&mut |id| {
        count += 1;
        if !count_only {
            writeln!(out, "{id}").map_err(|e| BackendError::storage(Operation::Foreach, e))?;
        }
        Ok(())
    })?;

    if count_only {
        writeln!(out, "{count}")?;
    }
    Ok(())
}
