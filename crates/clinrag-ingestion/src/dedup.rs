//! Identity and deduplication: a SHA-256 content hash of the raw uploaded
//! bytes. Document identity requires exact content-hash equality, not
//! approximate similarity.

use sha2::{Digest, Sha256};

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_hash_identically() {
        let a = content_hash(b"same content");
        let b = content_hash(b"same content");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_hash_differently() {
        assert_ne!(content_hash(b"one"), content_hash(b"two"));
    }
}
