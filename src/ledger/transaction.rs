//! Transactions submitted to the ledger
//!
//! A transaction carries a [`Message`] (instructions plus the slot it was
//! built against) and one ECDSA signature per signing key. The ledger only
//! executes an instruction if every account meta marked `is_signer` is backed
//! by a valid signature over the message.

use crate::crypto::{sha256, sha256_hex, verify_signature, KeyError, KeyPair, Pubkey};
use crate::ledger::context::InstructionError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Reasons a transaction is rejected as a whole
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid signature from {0}")]
    InvalidSignature(Pubkey),
    #[error("Missing required signature for {0}")]
    MissingRequiredSignature(Pubkey),
    #[error("Transaction already processed: {0}")]
    DuplicateTransaction(String),
    #[error("Stale transaction: built at slot {recent_slot}, ledger at slot {current_slot}")]
    StaleTransaction { recent_slot: u64, current_slot: u64 },
    #[error("Unknown program: {0}")]
    UnknownProgram(Pubkey),
    #[error("Instruction {index} failed: {error}")]
    InstructionError {
        index: usize,
        #[source]
        error: InstructionError,
    },
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TransactionError {
    /// Program-defined error code, if an instruction failed with one
    pub fn custom_code(&self) -> Option<u32> {
        match self {
            TransactionError::InstructionError {
                error: InstructionError::Custom { code, .. },
                ..
            } => Some(*code),
            _ => None,
        }
    }
}

// =============================================================================
// Instructions
// =============================================================================

/// An account referenced by an instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    /// The key must have signed the enclosing transaction
    pub is_signer: bool,
    /// The instruction may change the account
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// A read-only account
    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    /// Build an instruction whose data is the JSON encoding of `data`
    pub fn new_with_json<T: Serialize>(
        program_id: Pubkey,
        data: &T,
        accounts: Vec<AccountMeta>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            program_id,
            accounts,
            data: serde_json::to_vec(data)?,
        })
    }
}

/// The signed part of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Ledger slot the transaction was built against
    pub recent_slot: u64,
    pub instructions: Vec<Instruction>,
}

impl Message {
    pub fn new(instructions: Vec<Instruction>, recent_slot: u64) -> Self {
        Self {
            recent_slot,
            instructions,
        }
    }

    /// Digest every signer signs
    pub fn signing_data(&self) -> Result<Vec<u8>, serde_json::Error> {
        Ok(sha256(&serde_json::to_vec(self)?))
    }

    /// Hex of [`Message::signing_data`]
    ///
    /// Identifies the message independently of how its signatures are
    /// encoded or ordered; the ledger keys replay protection on it.
    pub fn hash(&self) -> Result<String, serde_json::Error> {
        Ok(hex::encode(self.signing_data()?))
    }

    /// Keys whose metas demand a signature, in first-seen order
    pub fn required_signers(&self) -> Vec<Pubkey> {
        let mut seen = HashSet::new();
        self.instructions
            .iter()
            .flat_map(|ix| ix.accounts.iter())
            .filter(|meta| meta.is_signer && seen.insert(meta.pubkey))
            .map(|meta| meta.pubkey)
            .collect()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// One signature over a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub pubkey: Pubkey,
    /// Compact ECDSA signature (hex)
    pub signature: String,
}

/// A signed message ready for submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Hash of the message digest and all signatures
    pub id: String,
    pub message: Message,
    pub signatures: Vec<SignatureEntry>,
}

impl Transaction {
    /// Build and sign a transaction with every key in `signers`
    pub fn new_signed(
        instructions: Vec<Instruction>,
        recent_slot: u64,
        signers: &[&KeyPair],
    ) -> Result<Self, TransactionError> {
        let message = Message::new(instructions, recent_slot);
        let signing_data = message.signing_data()?;

        let mut signatures = Vec::with_capacity(signers.len());
        for key_pair in signers {
            let pubkey = key_pair.pubkey();
            if signatures.iter().any(|s: &SignatureEntry| s.pubkey == pubkey) {
                continue;
            }
            signatures.push(SignatureEntry {
                pubkey,
                signature: hex::encode(key_pair.sign(&signing_data)?),
            });
        }

        let mut tx = Self {
            id: String::new(),
            message,
            signatures,
        };
        tx.id = tx.calculate_id()?;
        Ok(tx)
    }

    /// Recompute the transaction id
    pub fn calculate_id(&self) -> Result<String, TransactionError> {
        let mut data = self.message.signing_data()?;
        for entry in &self.signatures {
            data.extend_from_slice(entry.pubkey.as_bytes());
            data.extend_from_slice(entry.signature.as_bytes());
        }
        Ok(sha256_hex(&data))
    }

    /// Check every signature and return the set of verified signers
    pub fn verify_signatures(&self) -> Result<HashSet<Pubkey>, TransactionError> {
        if self.message.instructions.is_empty() {
            return Err(TransactionError::InvalidTransaction(
                "no instructions".to_string(),
            ));
        }
        if self.signatures.is_empty() {
            return Err(TransactionError::InvalidTransaction(
                "no signatures".to_string(),
            ));
        }
        if self.id != self.calculate_id()? {
            return Err(TransactionError::InvalidTransaction(
                "id does not match contents".to_string(),
            ));
        }

        let signing_data = self.message.signing_data()?;
        let mut signers = HashSet::with_capacity(self.signatures.len());

        for entry in &self.signatures {
            let sig_bytes = hex::decode(&entry.signature)
                .map_err(|_| TransactionError::InvalidSignature(entry.pubkey))?;
            let valid = verify_signature(&entry.pubkey, &signing_data, &sig_bytes)
                .map_err(|_| TransactionError::InvalidSignature(entry.pubkey))?;
            if !valid {
                return Err(TransactionError::InvalidSignature(entry.pubkey));
            }
            signers.insert(entry.pubkey);
        }

        for required in self.message.required_signers() {
            if !signers.contains(&required) {
                return Err(TransactionError::MissingRequiredSignature(required));
            }
        }

        Ok(signers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instruction(signer: &Pubkey) -> Instruction {
        Instruction {
            program_id: Pubkey::derive(b"test-program"),
            accounts: vec![
                AccountMeta::new(*signer, true),
                AccountMeta::new_readonly(Pubkey::derive(b"other"), false),
            ],
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let alice = KeyPair::generate();
        let tx = Transaction::new_signed(vec![sample_instruction(&alice.pubkey())], 0, &[&alice])
            .unwrap();

        let signers = tx.verify_signatures().unwrap();
        assert!(signers.contains(&alice.pubkey()));
        assert_eq!(signers.len(), 1);
    }

    #[test]
    fn test_missing_signer_rejected() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let tx = Transaction::new_signed(vec![sample_instruction(&alice.pubkey())], 0, &[&bob])
            .unwrap();

        let result = tx.verify_signatures();
        assert!(matches!(
            result,
            Err(TransactionError::MissingRequiredSignature(k)) if k == alice.pubkey()
        ));
    }

    #[test]
    fn test_tampered_message_rejected() {
        let alice = KeyPair::generate();
        let mut tx =
            Transaction::new_signed(vec![sample_instruction(&alice.pubkey())], 0, &[&alice])
                .unwrap();

        // Changing the payload breaks the id first
        tx.message.instructions[0].data = vec![9, 9, 9];
        assert!(matches!(
            tx.verify_signatures(),
            Err(TransactionError::InvalidTransaction(_))
        ));

        // Recomputing the id still leaves a signature over the old message
        tx.id = tx.calculate_id().unwrap();
        assert!(matches!(
            tx.verify_signatures(),
            Err(TransactionError::InvalidSignature(k)) if k == alice.pubkey()
        ));
    }

    #[test]
    fn test_duplicate_signers_collapse() {
        let alice = KeyPair::generate();
        let tx = Transaction::new_signed(
            vec![sample_instruction(&alice.pubkey())],
            0,
            &[&alice, &alice],
        )
        .unwrap();
        assert_eq!(tx.signatures.len(), 1);
    }

    #[test]
    fn test_required_signers_order() {
        let a = Pubkey::derive(b"a");
        let b = Pubkey::derive(b"b");
        let ix = Instruction {
            program_id: Pubkey::derive(b"p"),
            accounts: vec![
                AccountMeta::new(b, true),
                AccountMeta::new(a, true),
                AccountMeta::new(b, true),
            ],
            data: vec![],
        };
        assert_eq!(Message::new(vec![ix], 0).required_signers(), vec![b, a]);
    }
}
