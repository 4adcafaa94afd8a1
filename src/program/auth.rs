//! Signer authorization
//!
//! Each instruction names the roles whose keys must sign it. A role passes
//! when the presented key signed the transaction and, where a record already
//! stores that role's key, the presented key equals the stored one.

use crate::crypto::Pubkey;
use crate::ledger::InvokeContext;
use crate::program::error::ChannelError;
use bitflags::bitflags;

bitflags! {
    /// Roles that can be required to sign an instruction
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SignerRoles: u8 {
        /// Identity registering a payment user
        const USER = 0b0001;
        /// Treasury key of a wallet
        const OWNER = 0b0010;
        const USER1 = 0b0100;
        const USER2 = 0b1000;
    }
}

impl SignerRoles {
    /// Name of a single role, used in error messages
    pub fn role_name(self) -> &'static str {
        if self == SignerRoles::USER {
            "user"
        } else if self == SignerRoles::OWNER {
            "owner"
        } else if self == SignerRoles::USER1 {
            "user1"
        } else if self == SignerRoles::USER2 {
            "user2"
        } else {
            "roles"
        }
    }
}

/// Why a role failed authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// The presented key did not sign
    NotSigned { role: &'static str, key: Pubkey },
    /// The presented key signed but is not the stored key for the role
    KeyMismatch {
        role: &'static str,
        expected: Pubkey,
        actual: Pubkey,
    },
}

impl AuthFailure {
    /// Mapping used while a record is being created
    pub fn missing_signer(self) -> ChannelError {
        match self {
            AuthFailure::NotSigned { role, key } => ChannelError::MissingSigner { role, key },
            AuthFailure::KeyMismatch { role, actual, .. } => {
                ChannelError::UnauthorizedSigner { role, key: actual }
            }
        }
    }

    /// Mapping used against an existing record
    pub fn unauthorized(self) -> ChannelError {
        match self {
            AuthFailure::NotSigned { role, key } => ChannelError::UnauthorizedSigner { role, key },
            AuthFailure::KeyMismatch { role, actual, .. } => {
                ChannelError::UnauthorizedSigner { role, key: actual }
            }
        }
    }
}

/// Check every role in `required`
///
/// `presented` maps roles to the keys the instruction supplied for them;
/// `stored` maps roles to the keys already recorded, if any. Roles are checked
/// in bit order so the first failure is deterministic.
pub fn authorize(
    ctx: &InvokeContext<'_>,
    required: SignerRoles,
    presented: &[(SignerRoles, Pubkey)],
    stored: &[(SignerRoles, Pubkey)],
) -> Result<(), AuthFailure> {
    for role in required.iter() {
        let role_name = role.role_name();
        let key = presented
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, key)| *key)
            .ok_or(AuthFailure::NotSigned {
                role: role_name,
                key: Pubkey::zeroed(),
            })?;

        if !ctx.is_signer(&key) {
            return Err(AuthFailure::NotSigned {
                role: role_name,
                key,
            });
        }

        if let Some((_, expected)) = stored.iter().find(|(r, _)| *r == role) {
            if *expected != key {
                return Err(AuthFailure::KeyMismatch {
                    role: role_name,
                    expected: *expected,
                    actual: key,
                });
            }
        }
    }
    Ok(())
}
