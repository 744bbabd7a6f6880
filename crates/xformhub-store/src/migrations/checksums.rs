//! Checksums for migrations and stored schema sources

use sha2::{Digest, Sha256};

/// Compute the hex SHA256 of a string
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
