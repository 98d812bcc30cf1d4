//! Content hashing utilities for the signature system
//!
//! SHA-256 is used for certificate fingerprints and archive member digests. The
//! digest that goes into the signature itself is configured separately, see
//! [`DigestAlgorithm`](crate::signature::primitive::DigestAlgorithm).

use sha2::{Digest, Sha256};
use std::io::Read;

/// Prefix carried by every fingerprint string
pub const FINGERPRINT_PREFIX: &str = "sha256:";

/// Hash a byte slice using SHA-256, as `sha256:<hex>`
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{FINGERPRINT_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Hash everything a reader yields, as bare lowercase hex
pub fn hash_reader<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192]; // 8KB buffer for streaming

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes() {
        let hash = hash_bytes(b"hello world");
        assert!(hash.starts_with(FINGERPRINT_PREFIX));
        assert_eq!(hash.len(), 7 + 64); // "sha256:" + 64 hex chars
    }

    #[test]
    fn test_reader_and_bytes_agree() {
        let content = vec![7u8; 20_000]; // spans several buffer refills
        let streamed = hash_reader(&mut content.as_slice()).unwrap();
        assert_eq!(format!("{FINGERPRINT_PREFIX}{streamed}"), hash_bytes(&content));
    }
}
