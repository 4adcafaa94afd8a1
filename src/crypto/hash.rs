//! Cryptographic hashing utilities
//!
//! Provides the SHA-256 helpers used for message digests, transaction ids,
//! account discriminators and derived program ids.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a fixed-size array
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// First 8 bytes of `sha256("<namespace>:<name>")`
///
/// Used to tag account layouts so one record type can never be read as another.
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let hash = sha256_array(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}
