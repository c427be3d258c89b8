//! SHA-256 checksum utilities
//!
//! One canonical checksum format (`sha256:<hex>`) is used for generation
//! integrity checks.

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// Compute the checksum of `content` in the canonical `sha256:<hex>` form.
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Whether `value` looks like a checksum produced by [`compute_checksum`].
pub fn is_checksum(value: &str) -> bool {
    value
        .strip_prefix(PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}
