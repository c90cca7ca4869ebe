//! # Content Digests
//!
//! Index entries carry the SHA-256 digest of the archive bytes so clients
//! can verify downloads.

use sha2::{Digest, Sha256};

/// Compute the lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
