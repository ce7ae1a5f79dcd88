//! Rm command implementation.

use super::CliResult;
use blockstore_backend::{BlockBackend, BlockId};
use std::io::Write;

/// Runs the rm command. Removing an absent block is not an error.
pub fn run(backend: &dyn BlockBackend, id: &BlockId, out: &mut dyn Write) -> CliResult<()> {
    let existed = backend.exists(id)?;
    backend.remove(id)?;

    if existed {
        writeln!(out, "Removed {id}")?;
    } else {
        writeln!(out, "{id} was not present")?;
    }
    Ok(())
}
