//! Ledger accounts and rent
//!
//! Every piece of state lives in an [`Account`] addressed by a [`Pubkey`].
//! The account's `owner` is the program allowed to change its data and
//! debit its lamports.

use crate::crypto::Pubkey;
use serde::{Deserialize, Serialize};

/// Seed of the system id that owns plain user accounts
pub const SYSTEM_PROGRAM_SEED: &[u8] = b"system-program";

/// Id of the built-in system owner
pub fn system_program_id() -> Pubkey {
    Pubkey::derive(SYSTEM_PROGRAM_SEED)
}

/// An addressable unit of ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Balance held by the account
    pub lamports: u64,
    /// Program allowed to write `data` and debit `lamports`
    pub owner: Pubkey,
    /// Raw account data (hex in snapshots)
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Account {
    /// A plain balance-only account owned by the system
    pub fn new_system(lamports: u64) -> Self {
        Self {
            lamports,
            owner: system_program_id(),
            data: Vec::new(),
        }
    }

    /// A zero-filled account of `space` bytes owned by `owner`
    pub fn new_allocated(lamports: u64, space: usize, owner: Pubkey) -> Self {
        Self {
            lamports,
            owner,
            data: vec![0u8; space],
        }
    }

    /// Whether the account is owned by the system
    pub fn is_system_owned(&self) -> bool {
        self.owner == system_program_id()
    }
}

/// Rent parameters
///
/// Accounts created by programs must be funded with the rent-exempt minimum
/// for their data size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rent {
    pub lamports_per_byte_year: u64,
    pub exemption_threshold_years: u64,
    /// Bytes charged per account on top of its data
    pub account_storage_overhead: u64,
}

impl Default for Rent {
    fn default() -> Self {
        Self {
            lamports_per_byte_year: 3_480,
            exemption_threshold_years: 2,
            account_storage_overhead: 128,
        }
    }
}

impl Rent {
    /// Minimum balance for an account holding `data_len` bytes
    pub fn minimum_balance(&self, data_len: usize) -> u64 {
        let bytes = self.account_storage_overhead + data_len as u64;
        bytes * self.lamports_per_byte_year * self.exemption_threshold_years
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
