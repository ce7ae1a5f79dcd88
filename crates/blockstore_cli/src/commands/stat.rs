//! Stat command implementation.

use super::{CliResult, OutputFormat};
use blockstore_backend::{BlockBackend, BlockId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

/// Block metadata as reported by the CLI.
#[derive(Debug, Serialize)]
pub struct StatReport {
    /// Block ID.
    pub id: String,
    /// Size in bytes.
    pub size: u64,
    /// Whether the block is committed.
    pub exists: bool,
    /// Last modification time (RFC 3339), if the medium reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// Runs the stat command.
pub fn run(
    backend: &dyn BlockBackend,
    id: &BlockId,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let meta = backend.stat(id)?;
    let report = StatReport {
        id: id.to_hex(),
        size: meta.size,
        exists: meta.exists,
        modified: meta.modified.map(|t| {
            DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true)
        }),
    };

    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        OutputFormat::Text => {
            writeln!(out, "Block: {}", report.id)?;
            writeln!(out, "  Size: {} bytes", report.size)?;
            writeln!(out, "  Exists: {}", report.exists)?;
            if let Some(modified) = &report.modified {
                writeln!(out, "  Modified: {modified}")?;
            }
        }
    }
    Ok(())
}
