//! Instruction encoding and client-side builders

use crate::crypto::Pubkey;
use crate::ledger::{AccountMeta, Instruction};
use crate::program::auth::SignerRoles;
use crate::program::error::ChannelError;
use serde::{Deserialize, Serialize};

/// Instructions understood by the payment channel program
///
/// Encoded as JSON with an `instruction` tag, e.g.
/// `{"instruction":"update_balance","new_user1_contribution":1,"new_user2_contribution":2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum ChannelInstruction {
    /// Register an identity record
    ///
    /// Accounts:
    /// 0. `[signer, writable]` payment user record (new)
    /// 1. `[signer, writable]` user, pays rent
    CreatePaymentUser { name: String },

    /// Open a two-party channel and escrow both contributions
    ///
    /// Accounts:
    /// 0. `[signer, writable]` wallet record (new)
    /// 1. `[signer, writable]` owner, pays rent
    /// 2. `[signer, writable]` user1
    /// 3. `[signer, writable]` user2
    CreateMultisigWallet {
        user1_contribution: u64,
        user2_contribution: u64,
    },

    /// Re-split the escrow between the two participants
    ///
    /// Accounts:
    /// 0. `[writable]` wallet record
    /// 1. `[signer]` user1
    /// 2. `[signer]` user2
    UpdateBalance {
        new_user1_contribution: u64,
        new_user2_contribution: u64,
    },

    /// Disburse the escrow and close the wallet
    ///
    /// Accounts:
    /// 0. `[writable]` wallet record
    /// 1. `[writable]` owner, receives the rent deposit
    /// 2. `[signer]` owner's signing key
    /// 3. `[writable]` user1
    /// 4. `[writable]` user2
    CloseChannel,
}

impl ChannelInstruction {
    pub fn pack(&self) -> Result<Vec<u8>, ChannelError> {
        serde_json::to_vec(self).map_err(|e| ChannelError::InvalidInstructionData(e.to_string()))
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(data)
            .map_err(|e| ChannelError::InvalidInstructionData(e.to_string()))
    }

    /// Roles that must sign this instruction
    pub fn required_signers(&self) -> SignerRoles {
        match self {
            ChannelInstruction::CreatePaymentUser { .. } => SignerRoles::USER,
            ChannelInstruction::CreateMultisigWallet { .. } => {
                SignerRoles::OWNER | SignerRoles::USER1 | SignerRoles::USER2
            }
            ChannelInstruction::UpdateBalance { .. } => SignerRoles::USER1 | SignerRoles::USER2,
            ChannelInstruction::CloseChannel => SignerRoles::OWNER,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelInstruction::CreatePaymentUser { .. } => "create_payment_user",
            ChannelInstruction::CreateMultisigWallet { .. } => "create_multisig_wallet",
            ChannelInstruction::UpdateBalance { .. } => "update_balance",
            ChannelInstruction::CloseChannel => "close_channel",
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn create_payment_user(
    payment_user: &Pubkey,
    user: &Pubkey,
    name: impl Into<String>,
) -> Result<Instruction, serde_json::Error> {
    Instruction::new_with_json(
        crate::program::id(),
        &ChannelInstruction::CreatePaymentUser { name: name.into() },
        vec![
            AccountMeta::new(*payment_user, true),
            AccountMeta::new(*user, true),
        ],
    )
}

pub fn create_multisig_wallet(
    wallet: &Pubkey,
    owner: &Pubkey,
    user1: &Pubkey,
    user2: &Pubkey,
    user1_contribution: u64,
    user2_contribution: u64,
) -> Result<Instruction, serde_json::Error> {
    Instruction::new_with_json(
        crate::program::id(),
        &ChannelInstruction::CreateMultisigWallet {
            user1_contribution,
            user2_contribution,
        },
        vec![
            AccountMeta::new(*wallet, true),
            AccountMeta::new(*owner, true),
            AccountMeta::new(*user1, true),
            AccountMeta::new(*user2, true),
        ],
    )
}

pub fn update_balance(
    wallet: &Pubkey,
    user1: &Pubkey,
    user2: &Pubkey,
    new_user1_contribution: u64,
    new_user2_contribution: u64,
) -> Result<Instruction, serde_json::Error> {
    Instruction::new_with_json(
        crate::program::id(),
        &ChannelInstruction::UpdateBalance {
            new_user1_contribution,
            new_user2_contribution,
        },
        vec![
            AccountMeta::new(*wallet, false),
            AccountMeta::new_readonly(*user1, true),
            AccountMeta::new_readonly(*user2, true),
        ],
    )
}

pub fn close_channel(
    wallet: &Pubkey,
    owner: &Pubkey,
    signer: &Pubkey,
    user1: &Pubkey,
    user2: &Pubkey,
) -> Result<Instruction, serde_json::Error> {
    Instruction::new_with_json(
        crate::program::id(),
        &ChannelInstruction::CloseChannel,
        vec![
            AccountMeta::new(*wallet, false),
            AccountMeta::new(*owner, false),
            AccountMeta::new_readonly(*signer, true),
            AccountMeta::new(*user1, false),
            AccountMeta::new(*user2, false),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_tagged_json() {
        let ix = ChannelInstruction::UpdateBalance {
            new_user1_contribution: 1_500_000,
            new_user2_contribution: 1_500_000,
        };
        let json = String::from_utf8(ix.pack().unwrap()).unwrap();
        assert!(json.contains("\"instruction\":\"update_balance\""));
        assert_eq!(ChannelInstruction::unpack(json.as_bytes()).unwrap(), ix);

        let close = ChannelInstruction::unpack(br#"{"instruction":"close_channel"}"#).unwrap();
        assert_eq!(close, ChannelInstruction::CloseChannel);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            ChannelInstruction::unpack(b"\x00\x01"),
            Err(ChannelError::InvalidInstructionData(_))
        ));
        assert!(matches!(
            ChannelInstruction::unpack(br#"{"instruction":"drain_wallet"}"#),
            Err(ChannelError::InvalidInstructionData(_))
        ));
    }

    #[test]
    fn test_required_signers() {
        assert_eq!(
            ChannelInstruction::CloseChannel.required_signers(),
            SignerRoles::OWNER
        );
        let create = ChannelInstruction::CreateMultisigWallet {
            user1_contribution: 0,
            user2_contribution: 0,
        };
        assert!(create.required_signers().contains(SignerRoles::USER2));
        assert_eq!(create.name(), "create_multisig_wallet");
    }

    #[test]
    fn test_builders_set_account_metas() {
        let wallet = Pubkey::derive(b"wallet");
        let owner = Pubkey::derive(b"owner");
        let alice = Pubkey::derive(b"alice");
        let bob = Pubkey::derive(b"bob");

        let ix = close_channel(&wallet, &owner, &owner, &alice, &bob).unwrap();
        assert_eq!(ix.program_id, crate::program::id());
        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts[2].is_signer && !ix.accounts[2].is_writable);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);

        let ix = update_balance(&wallet, &alice, &bob, 1, 2).unwrap();
        assert!(ix.accounts[1].is_signer && ix.accounts[2].is_signer);
        assert!(ix.accounts[0].is_writable);
    }
}
