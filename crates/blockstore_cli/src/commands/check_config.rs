//! Check-config command implementation.

use super::CliResult;
use blockstore_backend::Backend;
use std::io::Write;

/// Runs the check-config command.
///
/// The backend has already been built from the configuration by the time
/// this runs; reaching it means the configuration is valid.
pub fn run(backend: &Backend, out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "Configuration OK")?;
    writeln!(out, "  Backend: {}", backend.kind())?;
    if let Backend::Filesystem(fs) = backend {
        writeln!(out, "  Block directory: {}", fs.block_dir().display())?;
        writeln!(out, "  Staging directory: {}", fs.tmp_dir().display())?;
    }
    Ok(())
}
