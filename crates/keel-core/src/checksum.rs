//! Content checksums for migration scripts.
//!
//! A checksum is the lowercase hex SHA-256 of the script's raw bytes. The file
//! name takes no part in it, so renaming a script never changes its checksum.

use sha2::{Digest, Sha256};

/// Compute the checksum of `content`.
pub fn checksum(content: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(content);
  hex::encode(hasher.finalize())
}
