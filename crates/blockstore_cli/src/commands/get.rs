//! Get command implementation.

use super::CliResult;
use blockstore_backend::{BlockBackend, BlockId, OpenMode};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// Runs the get command, streaming the block to `output` or to `out`.
pub fn run(
    backend: &dyn BlockBackend,
    id: &BlockId,
    output: Option<&Path>,
    out: &mut dyn Write,
) -> CliResult<()> {
    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            copy_block(backend, id, &mut file)?;
            file.sync_all()?;
        }
        None => {
            copy_block(backend, id, out)?;
        }
    }
    Ok(())
}

/// Copies a block into `sink` chunk by chunk, returning the byte count.
fn copy_block(backend: &dyn BlockBackend, id: &BlockId, sink: &mut dyn Write) -> CliResult<u64> {
    let mut handle = backend.open(id, OpenMode::Read);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    let result = loop {
        match backend.read(&mut handle, &mut buf) {
            Ok(0) => break Ok(total),
            Ok(n) => {
                if let Err(e) = sink.write_all(&buf[..n]) {
                    break Err(e.into());
                }
                total += n as u64;
            }
            Err(e) => break Err(e.into()),
        }
    };
    backend.close(&mut handle);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_testkit::TestBackend;

    #[test]
    fn writes_to_stdout_sink() {
        let fixture = TestBackend::filesystem();
        let data = vec![7u8; CHUNK_SIZE + 10];
        let id = BlockId::for_content(&data);
        fixture.write_block(&id, &data).unwrap();

        let mut out = Vec::new();
        run(&*fixture, &id, None, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn writes_to_file() {
        let fixture = TestBackend::distributed();
        let id = BlockId::for_content(b"to file");
        fixture.write_block(&id, b"to file").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut out = Vec::new();
        run(&*fixture, &id, Some(&path), &mut out).unwrap();

        assert!(out.is_empty());
        assert_eq!(std::fs::read(&path).unwrap(), b"to file");
    }

    #[test]
    fn missing_block_fails() {
        let fixture = TestBackend::filesystem();
        let id = BlockId::for_content(b"absent");
        assert!(run(&*fixture, &id, None, &mut Vec::new()).is_err());
    }
}
