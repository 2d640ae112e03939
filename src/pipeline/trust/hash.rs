use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::TrustError;

pub const FINGERPRINT_ALGORITHM: &str = "sha256";

/// SHA-256 digest length in hex characters.
const DIGEST_HEX_LEN: usize = 64;

/// Digest of a document's exact bytes. The hex form is canonically lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint {
    pub algorithm: String,
    pub digest: String,
}

impl ContentFingerprint {
    /// Parse a user-supplied hex digest (optionally `0x`-prefixed, any case).
    pub fn from_hex(input: &str) -> Result<Self, TrustError> {
        let trimmed = input.trim();
        let raw = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if raw.len() != DIGEST_HEX_LEN || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TrustError::InvalidFingerprint(format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {:?}",
                input
            )));
        }

        Ok(Self {
            algorithm: FINGERPRINT_ALGORITHM.to_string(),
            digest: raw.to_ascii_lowercase(),
        })
    }

    pub fn hex(&self) -> &str {
        &self.digest
    }

    /// First `len` hex characters (whole digest if shorter).
    pub fn prefix(&self, len: usize) -> &str {
        &self.digest[..len.min(self.digest.len())]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

/// Fingerprint raw document bytes. Pure and total.
pub fn hash(bytes: &[u8]) -> ContentFingerprint {
    let digest = Sha256::digest(bytes);
    ContentFingerprint {
        algorithm: FINGERPRINT_ALGORITHM.to_string(),
        digest: hex::encode(digest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash(b"FIR No. 112/2024");
        let b = hash(b"FIR No. 112/2024");
        assert_eq!(a, b);
        assert_eq!(a.algorithm, "sha256");
    }

    #[test]
    fn single_bit_flip_changes_digest() {
        let original = b"At 10 AM near the Market".to_vec();
        let mut flipped = original.clone();
        flipped[0] ^= 0x01;
        assert_ne!(hash(&original), hash(&flipped));
    }

    #[test]
    fn empty_input_has_known_digest() {
        assert_eq!(
            hash(&[]).hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let fp = hash(b"witness");
        assert_eq!(fp.hex().len(), 64);
        assert!(fp.hex().chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn from_hex_normalizes_case_and_prefix() {
        let fp = hash(b"statement");
        let upper = format!("0x{}", fp.hex().to_uppercase());
        assert_eq!(ContentFingerprint::from_hex(&upper).unwrap(), fp);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(ContentFingerprint::from_hex("abc").is_err());
        assert!(ContentFingerprint::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn prefix_is_bounded() {
        let fp = hash(b"x");
        assert_eq!(fp.prefix(24).len(), 24);
        assert_eq!(fp.prefix(1000).len(), 64);
    }

    #[test]
    fn display_includes_algorithm() {
        assert!(hash(b"x").to_string().starts_with("sha256:"));
    }
}
