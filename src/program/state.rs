//! Account records owned by the payment channel program
//!
//! Both records use a fixed little-endian layout prefixed with an 8-byte
//! discriminator, `sha256("account:<TypeName>")[..8]`. An all-zero prefix
//! marks freshly allocated space and `[0xff; 8]` marks a closed record.

use crate::crypto::{discriminator, Pubkey, PUBKEY_BYTES};
use crate::ledger::{InstructionError, Ledger};
use crate::program::error::ChannelError;
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Longest accepted user name, in bytes
pub const MAX_NAME_LEN: usize = 64;

/// Discriminator length
pub const DISCRIMINATOR_LEN: usize = 8;

/// Prefix written over a record when it is closed
pub const CLOSED_DISCRIMINATOR: [u8; DISCRIMINATOR_LEN] = [0xff; DISCRIMINATOR_LEN];

const UNINITIALIZED_DISCRIMINATOR: [u8; DISCRIMINATOR_LEN] = [0u8; DISCRIMINATOR_LEN];

// =============================================================================
// Record trait
// =============================================================================

/// Lifecycle of a record as read from raw account data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    /// Space allocated, nothing written yet
    Uninitialized,
    Active,
    /// Terminal; the record can never be used again
    Closed,
    /// Data belongs to a different record type
    Foreign,
}

/// A program record with a fixed binary layout
pub trait AccountRecord: Sized {
    /// Type name the discriminator is derived from
    const NAME: &'static str;
    /// Total size including the discriminator
    const LEN: usize;

    fn write_body(&self, dst: &mut [u8]);

    fn read_body(src: &[u8]) -> Result<Self, ChannelError>;

    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        discriminator("account", Self::NAME)
    }

    /// Classify raw account data
    fn state_of(data: &[u8]) -> RecordState {
        match data.get(..DISCRIMINATOR_LEN) {
            Some(prefix) if prefix == UNINITIALIZED_DISCRIMINATOR => RecordState::Uninitialized,
            Some(prefix) if prefix == CLOSED_DISCRIMINATOR => RecordState::Closed,
            Some(prefix) if prefix == Self::discriminator() => RecordState::Active,
            _ => RecordState::Foreign,
        }
    }

    /// Serialize into account data
    fn pack_into(&self, dst: &mut [u8]) -> Result<(), ChannelError> {
        if dst.len() < Self::LEN {
            return Err(ChannelError::InvalidArgument(format!(
                "{} needs {} bytes, account has {}",
                Self::NAME,
                Self::LEN,
                dst.len()
            )));
        }
        dst[..DISCRIMINATOR_LEN].copy_from_slice(&Self::discriminator());
        self.write_body(&mut dst[DISCRIMINATOR_LEN..Self::LEN]);
        Ok(())
    }

    /// Deserialize from the data of the account at `address`
    fn unpack(address: &Pubkey, src: &[u8]) -> Result<Self, ChannelError> {
        match Self::state_of(src) {
            RecordState::Active if src.len() >= Self::LEN => {
                Self::read_body(&src[DISCRIMINATOR_LEN..Self::LEN])
            }
            RecordState::Active => Err(ChannelError::InvalidState(format!(
                "{} at {} is truncated",
                Self::NAME,
                address
            ))),
            RecordState::Uninitialized => Err(ChannelError::InvalidState(format!(
                "{} at {} is not initialized",
                Self::NAME,
                address
            ))),
            RecordState::Closed => Err(ChannelError::InvalidState(format!(
                "{} at {} is closed",
                Self::NAME,
                address
            ))),
            RecordState::Foreign => Err(ChannelError::AccountTypeMismatch(*address)),
        }
    }

    /// Overwrite a record with the closed marker and a zeroed body
    fn write_closed(dst: &mut [u8]) -> Result<(), ChannelError> {
        if dst.len() < DISCRIMINATOR_LEN {
            return Err(ChannelError::InvalidArgument(
                "account too small to close".to_string(),
            ));
        }
        dst.fill(0);
        dst[..DISCRIMINATOR_LEN].copy_from_slice(&CLOSED_DISCRIMINATOR);
        Ok(())
    }

    /// Read a record from the ledger (no access control on reads)
    fn fetch(ledger: &Ledger, address: &Pubkey) -> Result<Self, ChannelError> {
        let account = ledger
            .get_account(address)
            .ok_or(InstructionError::AccountNotFound(*address))?;
        if account.owner != crate::program::id() {
            return Err(ChannelError::InvalidAccountOwner(*address));
        }
        Self::unpack(address, &account.data)
    }
}

// Layout cursors

fn put_pubkey(dst: &mut [u8], offset: &mut usize, key: &Pubkey) {
    dst[*offset..*offset + PUBKEY_BYTES].copy_from_slice(key.as_bytes());
    *offset += PUBKEY_BYTES;
}

fn put_u64(dst: &mut [u8], offset: &mut usize, value: u64) {
    dst[*offset..*offset + 8].copy_from_slice(&value.to_le_bytes());
    *offset += 8;
}

fn take_pubkey(src: &[u8], offset: &mut usize) -> Result<Pubkey, ChannelError> {
    let bytes = src
        .get(*offset..*offset + PUBKEY_BYTES)
        .ok_or_else(|| ChannelError::InvalidState("record truncated".to_string()))?;
    *offset += PUBKEY_BYTES;
    Pubkey::try_from_slice(bytes).map_err(|e| ChannelError::InvalidState(e.to_string()))
}

fn take_u64(src: &[u8], offset: &mut usize) -> Result<u64, ChannelError> {
    let bytes: [u8; 8] = src
        .get(*offset..*offset + 8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ChannelError::InvalidState("record truncated".to_string()))?;
    *offset += 8;
    Ok(u64::from_le_bytes(bytes))
}

// =============================================================================
// PaymentUser
// =============================================================================

/// A registered identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUser {
    pub name: String,
    /// Key that created and controls the record
    pub owner: Pubkey,
}

impl PaymentUser {
    /// Validate the name and build a record
    pub fn new(name: String, owner: Pubkey) -> Result<Self, ChannelError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(ChannelError::InvalidNameLength {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        Ok(Self { name, owner })
    }
}

impl AccountRecord for PaymentUser {
    const NAME: &'static str = "PaymentUser";
    // discriminator | owner | name_len u32 | name (padded)
    const LEN: usize = DISCRIMINATOR_LEN + PUBKEY_BYTES + 4 + MAX_NAME_LEN;

    fn write_body(&self, dst: &mut [u8]) {
        dst.fill(0);
        let mut offset = 0;
        put_pubkey(dst, &mut offset, &self.owner);
        dst[offset..offset + 4].copy_from_slice(&(self.name.len() as u32).to_le_bytes());
        offset += 4;
        dst[offset..offset + self.name.len()].copy_from_slice(self.name.as_bytes());
    }

    fn read_body(src: &[u8]) -> Result<Self, ChannelError> {
        let mut offset = 0;
        let owner = take_pubkey(src, &mut offset)?;

        let len_bytes: [u8; 4] = src
            .get(offset..offset + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| ChannelError::InvalidState("record truncated".to_string()))?;
        offset += 4;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_NAME_LEN {
            return Err(ChannelError::InvalidState(format!(
                "stored name length {} exceeds {}",
                len, MAX_NAME_LEN
            )));
        }

        let name_bytes = src
            .get(offset..offset + len)
            .ok_or_else(|| ChannelError::InvalidState("record truncated".to_string()))?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|_| ChannelError::InvalidState("stored name is not UTF-8".to_string()))?;

        Ok(Self { name, owner })
    }
}

// =============================================================================
// MultisigWallet
// =============================================================================

/// Two-party channel settlement record
///
/// While active, the account holds the rent-exempt minimum for
/// [`MultisigWallet::LEN`] plus exactly `user1_contribution +
/// user2_contribution` lamports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigWallet {
    /// Treasury key allowed to close the channel
    pub owner: Pubkey,
    pub user1: Pubkey,
    pub user2: Pubkey,
    pub user1_contribution: u64,
    pub user2_contribution: u64,
}

impl MultisigWallet {
    /// Sum of both contributions, `None` on overflow
    pub fn total_contribution(&self) -> Option<u64> {
        self.user1_contribution.checked_add(self.user2_contribution)
    }
}

impl AccountRecord for MultisigWallet {
    const NAME: &'static str = "MultisigWallet";
    // discriminator | owner | user1 | user2 | user1_contribution | user2_contribution
    const LEN: usize = DISCRIMINATOR_LEN + 3 * PUBKEY_BYTES + 2 * 8;

    fn write_body(&self, dst: &mut [u8]) {
        let mut offset = 0;
        put_pubkey(dst, &mut offset, &self.owner);
        put_pubkey(dst, &mut offset, &self.user1);
        put_pubkey(dst, &mut offset, &self.user2);
        put_u64(dst, &mut offset, self.user1_contribution);
        put_u64(dst, &mut offset, self.user2_contribution);
    }

    fn read_body(src: &[u8]) -> Result<Self, ChannelError> {
        let mut offset = 0;
        Ok(Self {
            owner: take_pubkey(src, &mut offset)?,
            user1: take_pubkey(src, &mut offset)?,
            user2: take_pubkey(src, &mut offset)?,
            user1_contribution: take_u64(src, &mut offset)?,
            user2_contribution: take_u64(src, &mut offset)?,
        })
    }
}
