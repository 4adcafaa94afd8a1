//! Paychan-Multisig: a two-party multisig payment channel program in Rust
//!
//! This crate provides:
//! - An in-process account ledger with signed, atomic, replay-protected transactions
//! - ECDSA digital signatures (secp256k1)
//! - A payment channel program: identity records, escrowed two-party wallets,
//!   jointly signed balance updates and owner-controlled close
//! - JSON persistence of ledger snapshots with rotating backups
//!
//! # Example
//!
//! ```rust
//! use paychan_multisig::crypto::KeyPair;
//! use paychan_multisig::ledger::{Ledger, Transaction};
//! use paychan_multisig::program::{instruction, AccountRecord, ChannelProgram, MultisigWallet};
//! use std::sync::Arc;
//!
//! let mut ledger = Ledger::default();
//! ledger.register_program(Arc::new(ChannelProgram));
//!
//! let (wallet, owner, alice, bob) = (
//!     KeyPair::generate(),
//!     KeyPair::generate(),
//!     KeyPair::generate(),
//!     KeyPair::generate(),
//! );
//! for key in [&owner, &alice, &bob] {
//!     ledger.airdrop(&key.pubkey(), 1_000_000_000).unwrap();
//! }
//!
//! // Open a channel escrowing 1M from alice and 2M from bob
//! let open = instruction::create_multisig_wallet(
//!     &wallet.pubkey(),
//!     &owner.pubkey(),
//!     &alice.pubkey(),
//!     &bob.pubkey(),
//!     1_000_000,
//!     2_000_000,
//! )
//! .unwrap();
//! let tx = Transaction::new_signed(vec![open], ledger.slot(), &[&wallet, &owner, &alice, &bob])
//!     .unwrap();
//! ledger.process_transaction(&tx).unwrap();
//!
//! let state = MultisigWallet::fetch(&ledger, &wallet.pubkey()).unwrap();
//! assert_eq!(state.user2_contribution, 2_000_000);
//! ```

pub mod crypto;
pub mod ledger;
pub mod program;
pub mod storage;

// Re-export commonly used types
pub use crypto::{KeyPair, Pubkey};
pub use ledger::{
    Account, AccountMeta, Instruction, InstructionError, Ledger, LedgerConfig, Program,
    Transaction, TransactionError, TransactionReceipt,
};
pub use program::{
    ChannelError, ChannelInstruction, ChannelProgram, ErrorCode, MultisigWallet, PaymentUser,
    SignerRoles,
};
pub use storage::{Storage, StorageConfig, StorageError};
