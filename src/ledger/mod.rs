//! Host ledger the channel program executes against
//!
//! Accounts are global, key-addressed state held in an explicit [`Ledger`]
//! value. Clients submit signed [`Transaction`]s; the ledger verifies every
//! signature, runs each instruction through the addressed [`Program`] with an
//! [`InvokeContext`], and commits all of the transaction or none of it.
//!
//! # Example
//!
//! ```ignore
//! use paychan_multisig::ledger::{Ledger, Transaction};
//!
//! let mut ledger = Ledger::default();
//! ledger.register_program(program);
//! ledger.airdrop(&alice.pubkey(), 2_000_000_000)?;
//!
//! let tx = Transaction::new_signed(vec![instruction], ledger.slot(), &[&alice])?;
//! let receipt = ledger.process_transaction(&tx)?;
//! ```

pub mod account;
pub mod context;
pub mod ledger;
pub mod transaction;

pub use account::{system_program_id, Account, Rent};
pub use context::{InstructionError, InvokeContext};
pub use ledger::{Ledger, LedgerConfig, Program, TransactionReceipt};
pub use transaction::{
    AccountMeta, Instruction, Message, SignatureEntry, Transaction, TransactionError,
};
