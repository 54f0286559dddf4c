// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 content digests used as cache keys.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pagewerk_core::error::{PagewerkError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tracing::{debug, instrument};

/// Length of a digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// A lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Parse a hex digest, normalising to lowercase.
    pub fn parse(hex_digest: &str) -> Result<Self> {
        let normalised = hex_digest.trim().to_ascii_lowercase();
        if normalised.len() != DIGEST_HEX_LEN || hex::decode(&normalised).is_err() {
            return Err(PagewerkError::CacheIo(format!(
                "not a SHA-256 hex digest: {hex_digest:?}"
            )));
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading `len` hex characters, for short artifact names.
    pub fn prefix(&self, len: usize) -> &str {
        &self.0[..len.min(DIGEST_HEX_LEN)]
    }

    /// Derive a new digest from this one and extra context (for example a
    /// settings fingerprint), so the same bytes processed differently get
    /// distinct keys.
    pub fn combine(&self, context: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher.update([0u8]);
        hasher.update(context.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Digest {
    type Error = PagewerkError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.0
    }
}

/// Compute the SHA-256 digest of `data`.
pub fn digest_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 digest of a file, streaming it in blocks.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn digest_file(path: impl AsRef<Path>) -> Result<Digest> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut hasher = Sha256::new();
    let mut block = [0u8; 8192];
    let mut total: u64 = 0;
    loop {
        let read = reader.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
        total += read as u64;
    }
    let digest = Digest(hex::encode(hasher.finalize()));
    debug!(bytes = total, %digest, "file digested");
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn digest_empty_input() {
        assert_eq!(digest_bytes(b"").as_str(), EMPTY_SHA256);
    }

    #[test]
    fn digest_known_value() {
        // SHA-256("hello"), as printed by coreutils sha256sum.
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(digest_bytes(b"hello").as_str(), expected);
    }

    #[test]
    fn file_digest_matches_bytes_digest() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let payload = vec![0x5au8; 20_000];
        file.write_all(&payload).expect("write");
        let from_file = digest_file(file.path()).expect("digest file");
        assert_eq!(from_file, digest_bytes(&payload));
    }

    #[test]
    fn parse_accepts_uppercase_and_rejects_garbage() {
        let parsed = Digest::parse(&EMPTY_SHA256.to_uppercase()).expect("parse");
        assert_eq!(parsed.as_str(), EMPTY_SHA256);
        assert!(Digest::parse("abc").is_err());
        assert!(Digest::parse(&"z".repeat(DIGEST_HEX_LEN)).is_err());
    }

    #[test]
    fn combine_depends_on_context() {
        let base = digest_bytes(b"scan");
        assert_eq!(base.combine("a"), base.combine("a"));
        assert_ne!(base.combine("a"), base.combine("b"));
        assert_ne!(base.combine("a"), base);
    }
}
