//! Put command implementation.

use super::CliResult;
use blockstore_backend::{BlockBackend, BlockId};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Runs the put command, printing the new block's ID.
///
/// Storing content that is already present rewrites the same block.
pub fn run(backend: &dyn BlockBackend, file: &Path, out: &mut dyn Write) -> CliResult<()> {
    let data = fs::read(file)?;
    let id = BlockId::for_content(&data);

    backend.write_block(&id, &data)?;
    info!(%id, size = data.len(), file = %file.display(), "stored block");

    writeln!(out, "{id}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_testkit::TestBackend;

    #[test]
    fn stores_under_content_hash() {
        let fixture = TestBackend::cloud();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.bin");
        fs::write(&file, b"file content").unwrap();

        let mut out = Vec::new();
        run(&*fixture, &file, &mut out).unwrap();

        let id = BlockId::for_content(b"file content");
        assert_eq!(String::from_utf8(out).unwrap(), format!("{id}\n"));
        assert_eq!(fixture.read_block(&id).unwrap(), b"file content");
    }

    #[test]
    fn missing_file_fails() {
        let fixture = TestBackend::filesystem();
        let dir = tempfile::tempdir().unwrap();
        let err = run(&*fixture, &dir.path().join("absent"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, crate::commands::CliError::Io(_)));
    }
}
