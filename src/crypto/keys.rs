//! ECDSA key management
//!
//! Provides identity keys (`Pubkey`), key pair generation, signing, and
//! verification using the secp256k1 elliptic curve.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::hash::{sha256, sha256_array};

/// Length of a compressed secp256k1 public key
pub const PUBKEY_BYTES: usize = 33;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Key is not on the curve and cannot sign or verify")]
    OffCurve,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

// =============================================================================
// Pubkey
// =============================================================================

/// An identity key as stored in accounts and instructions
///
/// Holds the 33-byte compressed encoding of a secp256k1 public key. Keys
/// produced by [`Pubkey::derive`] start with `0x00`, which is never a valid
/// point prefix, so nobody holds a private key for them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; PUBKEY_BYTES]);

impl Pubkey {
    /// All-zero key
    pub const fn zeroed() -> Self {
        Self([0u8; PUBKEY_BYTES])
    }

    /// Wrap raw key bytes
    pub const fn new(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Build from a byte slice of exactly 33 bytes
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; PUBKEY_BYTES] = bytes.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self(arr))
    }

    /// Derive an off-curve key from a seed (program ids, system id)
    pub fn derive(seed: &[u8]) -> Self {
        let mut bytes = [0u8; PUBKEY_BYTES];
        bytes[1..].copy_from_slice(&sha256_array(seed));
        Self(bytes)
    }

    /// Raw key bytes
    pub fn to_bytes(&self) -> [u8; PUBKEY_BYTES] {
        self.0
    }

    /// Borrow the raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether this key is a point on the curve (and could therefore sign)
    pub fn is_on_curve(&self) -> bool {
        PublicKey::from_slice(&self.0).is_ok()
    }

    /// Convert to a curve point for signature verification
    pub fn to_public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::from_slice(&self.0).map_err(|_| KeyError::OffCurve)
    }
}

impl From<&PublicKey> for Pubkey {
    fn from(public_key: &PublicKey) -> Self {
        Self(public_key.serialize())
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl FromStr for Pubkey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// KeyPair
// =============================================================================

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// The identity key of this pair
    pub fn pubkey(&self) -> Pubkey {
        Pubkey::from(&self.public_key)
    }

    /// Sign a message hash with the private key
    pub fn sign(&self, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_message(&self.secret_key, message_hash)
    }

    /// Verify a signature against this key pair's public key
    pub fn verify(&self, message_hash: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        verify_signature(&self.pubkey(), message_hash, signature)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

fn digest32(message_hash: &[u8]) -> Vec<u8> {
    if message_hash.len() == 32 {
        message_hash.to_vec()
    } else {
        sha256(message_hash)
    }
}

/// Sign a message hash with a secret key
///
/// Inputs that are not already 32 bytes are hashed first.
pub fn sign_message(secret_key: &SecretKey, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(&digest32(message_hash))?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_compact().to_vec())
}

/// Verify a compact ECDSA signature against an identity key
pub fn verify_signature(
    pubkey: &Pubkey,
    message_hash: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let public_key = pubkey.to_public_key()?;

    let message = Message::from_digest_slice(&digest32(message_hash))?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    Ok(secp.verify_ecdsa(&message, &sig, &public_key).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert!(!kp.private_key_hex().is_empty());
        assert!(kp.pubkey().is_on_curve());
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let message_hash = sha256(b"Hello, channel!");

        let signature = kp.sign(&message_hash).unwrap();
        assert!(kp.verify(&message_hash, &signature).unwrap());

        let other = KeyPair::generate();
        assert!(!verify_signature(&other.pubkey(), &message_hash, &signature).unwrap());
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::from_private_key_hex(&kp1.private_key_hex()).unwrap();
        assert_eq!(kp1.pubkey(), kp2.pubkey());
    }

    #[test]
    fn test_pubkey_text_form() {
        let key = KeyPair::generate().pubkey();
        let parsed: Pubkey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);

        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(serde_json::from_str::<Pubkey>(&json).unwrap(), key);

        assert!("not-base58-0OIl".parse::<Pubkey>().is_err());
    }

    #[test]
    fn test_derived_keys_cannot_sign() {
        let program = Pubkey::derive(b"some-program");
        assert_eq!(program, Pubkey::derive(b"some-program"));
        assert!(!program.is_on_curve());
        assert!(matches!(
            verify_signature(&program, &[0u8; 32], &[0u8; 64]),
            Err(KeyError::OffCurve)
        ));
    }
}
