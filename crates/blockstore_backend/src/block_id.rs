//! Block identifier.

use crate::error::BackendError;
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Length of a block identifier's textual rendering.
pub const BLOCK_ID_LEN: usize = 40;

/// Content hash naming a block.
///
/// Block IDs are SHA-1 digests rendered as 40 lowercase hexadecimal
/// characters. They are:
/// - Immutable once computed
/// - Compared byte-wise
/// - Never reused for different content (callers guarantee this)
///
/// Anything that is not exactly 40 lowercase hex characters is rejected
/// at parse time, so drivers only ever see well-formed identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId([u8; 20]);

impl BlockId {
    /// Creates a block ID from a raw 20-byte digest.
    #[inline]
    #[must_use]
    pub const fn from_digest(digest: [u8; 20]) -> Self {
        Self(digest)
    }

    /// Computes the block ID for the given content.
    #[must_use]
    pub fn for_content(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    /// Parses the 40-character lowercase hex rendering.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidBlockId`] if the input has the wrong
    /// length or contains anything other than `0-9a-f`.
    pub fn parse(s: &str) -> Result<Self, BackendError> {
        let well_formed = s.len() == BLOCK_ID_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(BackendError::InvalidBlockId(s.to_string()));
        }

        let mut digest = [0u8; 20];
        hex::decode_to_slice(s, &mut digest)
            .map_err(|_| BackendError::InvalidBlockId(s.to_string()))?;
        Ok(Self(digest))
    }

    /// Returns the raw digest bytes.
    #[inline]
    #[must_use]
    pub const fn as_digest(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the 40-character hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.to_hex())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BlockId {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for BlockId {
    type Error = BackendError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<[u8; 20]> for BlockId {
    fn from(digest: [u8; 20]) -> Self {
        Self::from_digest(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn for_content_matches_sha1() {
        assert_eq!(BlockId::for_content(b"").to_string(), EMPTY_SHA1);
    }

    #[test]
    fn parse_valid() {
        let id = BlockId::parse(EMPTY_SHA1).unwrap();
        assert_eq!(id, BlockId::for_content(b""));
        assert_eq!(id.to_hex(), EMPTY_SHA1);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(BlockId::parse("").is_err());
        assert!(BlockId::parse(&EMPTY_SHA1[..39]).is_err());
        assert!(BlockId::parse(&format!("{EMPTY_SHA1}0")).is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        let bad = format!("g{}", &EMPTY_SHA1[1..]);
        assert!(matches!(
            BlockId::parse(&bad),
            Err(BackendError::InvalidBlockId(_))
        ));
    }

    #[test]
    fn parse_rejects_uppercase() {
        assert!(BlockId::parse(&EMPTY_SHA1.to_uppercase()).is_err());
    }

    #[test]
    fn from_str_and_debug() {
        let id: BlockId = EMPTY_SHA1.parse().unwrap();
        assert_eq!(format!("{id:?}"), format!("BlockId({EMPTY_SHA1})"));
    }

    proptest! {
        #[test]
        fn rendering_always_parses_back(digest in prop::array::uniform20(any::<u8>())) {
            let id = BlockId::from_digest(digest);
            let rendered = id.to_string();
            prop_assert_eq!(rendered.len(), BLOCK_ID_LEN);
            prop_assert_eq!(BlockId::parse(&rendered).unwrap(), id);
        }

        #[test]
        fn arbitrary_strings_rarely_parse(s in "[ -~]{0,48}") {
            let valid = s.len() == BLOCK_ID_LEN
                && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
            prop_assert_eq!(BlockId::parse(&s).is_ok(), valid);
        }
    }
}
