//! Content fingerprinting.
//!
//! Every `Document` carries the hex-encoded SHA-256 of its raw bytes at the
//! moment it was last read. The writer uses the same fingerprint as an
//! optimistic-concurrency guard. Hashing lives behind a trait, rather than
//! a bare function, so callers that need a different or faster digest
//! (benchmarks, testing) can substitute one without touching call sites.

use sha2::{Digest, Sha256};

/// Produces a stable, hex-encoded fingerprint of a byte slice.
pub trait ContentHasher: Send + Sync {
    fn fingerprint(&self, bytes: &[u8]) -> String;
}

/// The production hasher: hex-encoded SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn fingerprint(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let hasher = Sha256Hasher;
        assert_eq!(hasher.fingerprint(b"hello"), hasher.fingerprint(b"hello"));
    }

    #[test]
    fn fingerprint_differs_for_different_content() {
        let hasher = Sha256Hasher;
        assert_ne!(hasher.fingerprint(b"hello"), hasher.fingerprint(b"world"));
    }

    #[test]
    fn fingerprint_of_empty_input_is_the_known_sha256_empty_digest() {
        let hasher = Sha256Hasher;
        assert_eq!(
            hasher.fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
