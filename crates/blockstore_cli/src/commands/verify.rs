//! Verify command implementation.

use super::{CliError, CliResult};
use blockstore_backend::{BlockBackend, BlockId};
use std::io::Write;
use tracing::warn;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of blocks checked.
    pub blocks_checked: usize,
    /// Blocks whose content hashes to a different ID.
    pub mismatched: Vec<BlockId>,
    /// Blocks that could not be read, with the error.
    pub unreadable: Vec<(BlockId, String)>,
}

impl VerifyResult {
    /// Number of blocks that failed.
    pub fn failed(&self) -> usize {
        self.mismatched.len() + self.unreadable.len()
    }

    fn is_ok(&self) -> bool {
        self.failed() == 0
    }
}

/// Re-hashes every block and collects the ones that do not match their ID.
pub fn verify_blocks(backend: &dyn BlockBackend) -> CliResult<VerifyResult> {
    let mut ids = Vec::new();
    backend.foreach(&mut |id| {
        ids.push(*id);
        Ok(())
    })?;

    let mut result = VerifyResult::default();
    for id in ids {
        result.blocks_checked += 1;
        match backend.read_block(&id) {
            Ok(content) if BlockId::for_content(&content) == id => {}
            Ok(_) => {
                warn!(%id, "block content does not match its ID");
                result.mismatched.push(id);
            }
            // removed since it was listed
            Err(e) if e.is_not_found() => result.blocks_checked -= 1,
            Err(e) => {
                warn!(%id, error = %e, "cannot read block");
                result.unreadable.push((id, e.to_string()));
            }
        }
    }
    Ok(result)
}

/// Runs the verify command.
pub fn run(backend: &dyn BlockBackend, out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "Verifying blocks...")?;
    let result = verify_blocks(backend)?;

    writeln!(out, "  Blocks checked: {}", result.blocks_checked)?;
    for id in &result.mismatched {
        writeln!(out, "  MISMATCH {id}")?;
    }
    for (id, error) in &result.unreadable {
        writeln!(out, "  UNREADABLE {id}: {error}")?;
    }

    writeln!(out)?;
    if result.is_ok() {
        writeln!(out, "✓ Block verification passed")?;
        Ok(())
    } else {
        writeln!(out, "✗ Block verification failed")?;
        Err(CliError::VerificationFailed {
            checked: result.blocks_checked,
            corrupt: result.failed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_backend::OpenMode;
    use blockstore_testkit::TestBackend;

    #[test]
    fn clean_store_passes() {
        let fixture = TestBackend::filesystem();
        for data in [&b"a"[..], b"b", b""] {
            fixture.write_block(&BlockId::for_content(data), data).unwrap();
        }

        let mut out = Vec::new();
        run(&*fixture, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Blocks checked: 3"));
    }

    #[test]
    fn detects_mismatched_content() {
        let fixture = TestBackend::cloud();
        let good = BlockId::for_content(b"good");
        fixture.write_block(&good, b"good").unwrap();

        let bad = BlockId::for_content(b"expected");
        let mut handle = fixture.open(&bad, OpenMode::Write);
        fixture.write(&mut handle, b"tampered").unwrap();
        fixture.commit(&mut handle).unwrap();
        fixture.close(&mut handle);

        let result = verify_blocks(&*fixture).unwrap();
        assert_eq!(result.blocks_checked, 2);
        assert_eq!(result.mismatched, vec![bad]);

        let err = run(&*fixture, &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            CliError::VerificationFailed {
                checked: 2,
                corrupt: 1
            }
        ));
    }
}
