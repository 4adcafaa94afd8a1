//! Two-party multisig payment channel program
//!
//! Registers identities, opens channels that escrow both participants'
//! contributions, lets both participants jointly re-split the escrow, and lets
//! the treasury owner close the channel and disburse it.
//!
//! # Example
//!
//! ```ignore
//! use paychan_multisig::program::{instruction, AccountRecord, ChannelProgram, MultisigWallet};
//!
//! ledger.register_program(Arc::new(ChannelProgram));
//!
//! let open = instruction::create_multisig_wallet(
//!     &wallet.pubkey(), &owner.pubkey(), &alice.pubkey(), &bob.pubkey(),
//!     1_000_000, 2_000_000,
//! )?;
//! let tx = Transaction::new_signed(vec![open], ledger.slot(), &[&wallet, &owner, &alice, &bob])?;
//! ledger.process_transaction(&tx)?;
//!
//! let state = MultisigWallet::fetch(&ledger, &wallet.pubkey())?;
//! ```

pub mod auth;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;

use crate::crypto::Pubkey;

pub use auth::{authorize, AuthFailure, SignerRoles};
pub use error::{ChannelError, ErrorCode};
pub use instruction::ChannelInstruction;
pub use processor::{ChannelProgram, Processor, PROGRAM_NAME};
pub use state::{
    AccountRecord, MultisigWallet, PaymentUser, RecordState, CLOSED_DISCRIMINATOR,
    MAX_NAME_LEN,
};

/// Seed the program id is derived from
pub const PROGRAM_SEED: &[u8] = b"paychan-multisig";

/// Program id instructions are addressed to
pub fn id() -> Pubkey {
    Pubkey::derive(PROGRAM_SEED)
}
