//! In-process host ledger
//!
//! Holds every account, runs transactions against registered programs and
//! commits their effects atomically: instructions execute on a working copy
//! of the accounts, which replaces the committed state only if every
//! instruction succeeds.

use crate::crypto::Pubkey;
use crate::ledger::account::{Account, Rent};
use crate::ledger::context::{InstructionError, InvokeContext};
use crate::ledger::transaction::{Transaction, TransactionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Executable logic addressed by a program id
pub trait Program: Send + Sync {
    /// Id instructions use to address this program
    fn id(&self) -> Pubkey;

    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Execute one instruction
    fn process_instruction(
        &self,
        ctx: &mut InvokeContext<'_>,
        data: &[u8],
    ) -> Result<(), InstructionError>;
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub rent: Rent,
    /// How many slots a transaction's `recent_slot` may lag behind
    pub max_transaction_age: u64,
    /// Receipts kept in memory (oldest dropped first)
    pub max_receipts: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rent: Rent::default(),
            max_transaction_age: 150,
            max_receipts: 1024,
        }
    }
}

/// Record of a committed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub id: String,
    /// Slot the transaction was committed in
    pub slot: u64,
    pub signers: Vec<Pubkey>,
    pub logs: Vec<String>,
    pub committed_at: DateTime<Utc>,
}

/// Key-addressed account store with atomic transaction processing
#[derive(Clone, Serialize, Deserialize)]
pub struct Ledger {
    config: LedgerConfig,
    accounts: HashMap<Pubkey, Account>,
    slot: u64,
    /// Hashes of committed messages and their commit slot
    processed: HashMap<String, u64>,
    receipts: VecDeque<TransactionReceipt>,
    #[serde(skip)]
    programs: HashMap<Pubkey, Arc<dyn Program>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("slot", &self.slot)
            .field("accounts", &self.accounts.len())
            .field("programs", &self.programs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create an empty ledger
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            accounts: HashMap::new(),
            slot: 0,
            processed: HashMap::new(),
            receipts: VecDeque::new(),
            programs: HashMap::new(),
        }
    }

    /// Make a program callable by its id
    ///
    /// Programs are not part of snapshots and must be registered again after
    /// loading a ledger from storage.
    pub fn register_program(&mut self, program: Arc<dyn Program>) {
        let id = program.id();
        log::info!("Registered program {} at {}", program.name(), id);
        self.programs.insert(id, program);
    }

    /// Whether a program is registered at `id`
    pub fn has_program(&self, id: &Pubkey) -> bool {
        self.programs.contains_key(id)
    }

    /// Credit lamports to an account out of thin air (faucet)
    ///
    /// Missing accounts are created as plain system accounts. Returns the new
    /// balance.
    pub fn airdrop(&mut self, to: &Pubkey, lamports: u64) -> Result<u64, InstructionError> {
        let account = self
            .accounts
            .entry(*to)
            .or_insert_with(|| Account::new_system(0));
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or(InstructionError::ArithmeticOverflow)?;
        log::info!("Airdropped {} lamports to {}", lamports, to);
        Ok(account.lamports)
    }

    /// Submit a signed transaction
    ///
    /// On error nothing is committed: accounts, slot and receipts are left
    /// exactly as they were.
    pub fn process_transaction(
        &mut self,
        tx: &Transaction,
    ) -> Result<TransactionReceipt, TransactionError> {
        match self.execute(tx) {
            Ok(receipt) => {
                log::info!(
                    "Committed transaction {} at slot {} ({} instruction(s))",
                    &receipt.id[..16.min(receipt.id.len())],
                    receipt.slot,
                    tx.message.instructions.len()
                );
                Ok(receipt)
            }
            Err(e) => {
                log::warn!("Rejected transaction {}: {}", tx.id, e);
                Err(e)
            }
        }
    }

    fn execute(&mut self, tx: &Transaction) -> Result<TransactionReceipt, TransactionError> {
        let signers = tx.verify_signatures()?;

        let message_hash = tx.message.hash()?;
        if self.processed.contains_key(&message_hash) {
            return Err(TransactionError::DuplicateTransaction(message_hash));
        }

        let recent_slot = tx.message.recent_slot;
        if recent_slot > self.slot || self.slot - recent_slot > self.config.max_transaction_age {
            return Err(TransactionError::StaleTransaction {
                recent_slot,
                current_slot: self.slot,
            });
        }

        let mut working = self.accounts.clone();
        let mut logs = Vec::new();

        for (index, ix) in tx.message.instructions.iter().enumerate() {
            let program = self
                .programs
                .get(&ix.program_id)
                .ok_or(TransactionError::UnknownProgram(ix.program_id))?;

            logs.push(format!("Program {} invoke [{}]", program.name(), index));
            let mut ctx = InvokeContext::new(
                ix.program_id,
                &mut working,
                &ix.accounts,
                &self.config.rent,
                &mut logs,
            );
            program
                .process_instruction(&mut ctx, &ix.data)
                .map_err(|error| TransactionError::InstructionError { index, error })?;
        }

        // Commit
        self.accounts = working;
        self.slot += 1;
        self.processed.insert(message_hash, self.slot);
        self.prune_processed();

        let mut signers: Vec<Pubkey> = signers.into_iter().collect();
        signers.sort();

        let receipt = TransactionReceipt {
            id: tx.id.clone(),
            slot: self.slot,
            signers,
            logs,
            committed_at: Utc::now(),
        };
        self.receipts.push_back(receipt.clone());
        while self.receipts.len() > self.config.max_receipts {
            self.receipts.pop_front();
        }

        Ok(receipt)
    }

    /// Forget messages too old to pass the staleness check anyway
    fn prune_processed(&mut self) {
        let horizon = self
            .slot
            .saturating_sub(self.config.max_transaction_age.saturating_add(1));
        self.processed.retain(|_, slot| *slot >= horizon);
    }

    /// Get an account by address
    pub fn get_account(&self, address: &Pubkey) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Balance of an address, zero if it does not exist
    pub fn balance(&self, address: &Pubkey) -> u64 {
        self.accounts.get(address).map(|a| a.lamports).unwrap_or(0)
    }

    /// Number of accounts (tombstones included)
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Current slot (number of committed transactions)
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Rent-exempt minimum for `data_len` bytes
    pub fn minimum_balance(&self, data_len: usize) -> u64 {
        self.config.rent.minimum_balance(data_len)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Recent receipts, oldest first
    pub fn receipts(&self) -> impl Iterator<Item = &TransactionReceipt> {
        self.receipts.iter()
    }

    /// Look up a receipt by transaction id
    pub fn receipt(&self, id: &str) -> Option<&TransactionReceipt> {
        self.receipts.iter().find(|r| r.id == id)
    }

    /// Sum of all lamports held by all accounts
    pub fn total_lamports(&self) -> u128 {
        self.accounts.values().map(|a| a.lamports as u128).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::ledger::transaction::{AccountMeta, Instruction};

    /// Moves `data[1]` lamports from account 0 to account 1, or fails on opcode 1
    struct PayProgram;

    impl Program for PayProgram {
        fn id(&self) -> Pubkey {
            Pubkey::derive(b"pay-program")
        }

        fn name(&self) -> &str {
            "pay"
        }

        fn process_instruction(
            &self,
            ctx: &mut InvokeContext<'_>,
            data: &[u8],
        ) -> Result<(), InstructionError> {
            match data {
                [0, amount] => {
                    let from = ctx.account_key(0)?;
                    let to = ctx.account_key(1)?;
                    ctx.log(format!("paying {}", amount));
                    ctx.transfer_from_signer(&from, &to, *amount as u64)
                }
                [1] => Err(InstructionError::Custom {
                    code: 42,
                    message: "refused".to_string(),
                }),
                _ => Err(InstructionError::InvalidInstructionData(format!("{:?}", data))),
            }
        }
    }

    fn setup() -> (Ledger, KeyPair, KeyPair) {
        let mut ledger = Ledger::default();
        ledger.register_program(Arc::new(PayProgram));
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        ledger.airdrop(&alice.pubkey(), 1_000).unwrap();
        (ledger, alice, bob)
    }

    fn pay_ix(from: &KeyPair, to: &KeyPair, amount: u8) -> Instruction {
        Instruction {
            program_id: PayProgram.id(),
            accounts: vec![
                AccountMeta::new(from.pubkey(), true),
                AccountMeta::new(to.pubkey(), false),
            ],
            data: vec![0, amount],
        }
    }

    #[test]
    fn test_commit_advances_slot_and_records_receipt() {
        let (mut ledger, alice, bob) = setup();

        let tx = Transaction::new_signed(vec![pay_ix(&alice, &bob, 100)], 0, &[&alice]).unwrap();
        let receipt = ledger.process_transaction(&tx).unwrap();

        assert_eq!(receipt.slot, 1);
        assert_eq!(ledger.slot(), 1);
        assert_eq!(ledger.balance(&alice.pubkey()), 900);
        assert_eq!(ledger.balance(&bob.pubkey()), 100);
        assert!(receipt.logs.iter().any(|l| l == "Program log: paying 100"));
        assert!(ledger.receipt(&tx.id).is_some());
    }

    #[test]
    fn test_failed_instruction_rolls_back_whole_transaction() {
        let (mut ledger, alice, bob) = setup();

        let failing = Instruction {
            program_id: PayProgram.id(),
            accounts: vec![],
            data: vec![1],
        };
        let tx = Transaction::new_signed(vec![pay_ix(&alice, &bob, 100), failing], 0, &[&alice])
            .unwrap();

        let err = ledger.process_transaction(&tx).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InstructionError { index: 1, .. }
        ));
        assert_eq!(err.custom_code(), Some(42));

        // First instruction's transfer was discarded
        assert_eq!(ledger.balance(&alice.pubkey()), 1_000);
        assert!(ledger.get_account(&bob.pubkey()).is_none());
        assert_eq!(ledger.slot(), 0);
        assert_eq!(ledger.receipts().count(), 0);
    }

    #[test]
    fn test_replay_rejected() {
        let (mut ledger, alice, bob) = setup();

        let tx = Transaction::new_signed(vec![pay_ix(&alice, &bob, 10)], 0, &[&alice]).unwrap();
        ledger.process_transaction(&tx).unwrap();

        let result = ledger.process_transaction(&tx);
        assert!(matches!(result, Err(TransactionError::DuplicateTransaction(_))));
        assert_eq!(ledger.balance(&alice.pubkey()), 990);
    }

    #[test]
    fn test_reencoded_replay_rejected() {
        let (mut ledger, alice, bob) = setup();
        ledger.airdrop(&bob.pubkey(), 1_000).unwrap();

        // Both keys sign so the entries can be reordered
        let mut ix = pay_ix(&alice, &bob, 10);
        ix.accounts[1].is_signer = true;
        let tx = Transaction::new_signed(vec![ix], 0, &[&alice, &bob]).unwrap();
        ledger.process_transaction(&tx).unwrap();

        let mut upper = tx.clone();
        upper.signatures[0].signature = upper.signatures[0].signature.to_uppercase();
        upper.id = upper.calculate_id().unwrap();
        assert_ne!(upper.id, tx.id);
        assert!(upper.verify_signatures().is_ok());
        assert!(matches!(
            ledger.process_transaction(&upper),
            Err(TransactionError::DuplicateTransaction(_))
        ));

        let mut swapped = tx.clone();
        swapped.signatures.swap(0, 1);
        swapped.id = swapped.calculate_id().unwrap();
        assert!(matches!(
            ledger.process_transaction(&swapped),
            Err(TransactionError::DuplicateTransaction(_))
        ));

        assert_eq!(ledger.balance(&alice.pubkey()), 990);
        assert_eq!(ledger.slot(), 1);
    }

    #[test]
    fn test_stale_and_future_transactions_rejected() {
        let (mut ledger, alice, bob) = setup();

        let future = Transaction::new_signed(vec![pay_ix(&alice, &bob, 1)], 5, &[&alice]).unwrap();
        assert!(matches!(
            ledger.process_transaction(&future),
            Err(TransactionError::StaleTransaction { recent_slot: 5, current_slot: 0 })
        ));

        let mut config = LedgerConfig::default();
        config.max_transaction_age = 1;
        let mut ledger = Ledger::new(config);
        ledger.register_program(Arc::new(PayProgram));
        ledger.airdrop(&alice.pubkey(), 1_000).unwrap();

        for amount in 1..=2 {
            let slot = ledger.slot();
            let tx = Transaction::new_signed(vec![pay_ix(&alice, &bob, amount)], slot, &[&alice])
                .unwrap();
            ledger.process_transaction(&tx).unwrap();
        }

        let old = Transaction::new_signed(vec![pay_ix(&alice, &bob, 3)], 0, &[&alice]).unwrap();
        assert!(matches!(
            ledger.process_transaction(&old),
            Err(TransactionError::StaleTransaction { .. })
        ));
    }

    #[test]
    fn test_unknown_program_rejected() {
        let (mut ledger, alice, _) = setup();

        let ix = Instruction {
            program_id: Pubkey::derive(b"nobody"),
            accounts: vec![AccountMeta::new(alice.pubkey(), true)],
            data: vec![],
        };
        let tx = Transaction::new_signed(vec![ix], 0, &[&alice]).unwrap();
        assert!(matches!(
            ledger.process_transaction(&tx),
            Err(TransactionError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_receipts_are_bounded() {
        let mut config = LedgerConfig::default();
        config.max_receipts = 2;
        let mut ledger = Ledger::new(config);
        ledger.register_program(Arc::new(PayProgram));
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        ledger.airdrop(&alice.pubkey(), 1_000).unwrap();

        for amount in 1..=3 {
            let slot = ledger.slot();
            let tx = Transaction::new_signed(vec![pay_ix(&alice, &bob, amount)], slot, &[&alice])
                .unwrap();
            ledger.process_transaction(&tx).unwrap();
        }

        let slots: Vec<u64> = ledger.receipts().map(|r| r.slot).collect();
        assert_eq!(slots, vec![2, 3]);
        assert_eq!(ledger.total_lamports(), 1_000);
    }
}
