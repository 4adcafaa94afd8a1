//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing and account discriminators
//! - ECDSA key management (secp256k1)
//! - The `Pubkey` identity type used by accounts and instructions

pub mod hash;
pub mod keys;

pub use hash::{discriminator, sha256, sha256_array, sha256_hex};
pub use keys::{sign_message, verify_signature, KeyError, KeyPair, Pubkey, PUBKEY_BYTES};
