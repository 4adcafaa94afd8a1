//! Program invocation context
//!
//! An [`InvokeContext`] is the only handle a program gets on ledger state
//! while it executes one instruction. It operates on the transaction's
//! working copy of the accounts and enforces the host rules:
//!
//! - only accounts named by the instruction may be touched
//! - only writable accounts may change
//! - only the owning program may write data or spend lamports from an account
//! - system-owned accounts may only be debited when they signed
//! - new accounts must sign, must not already exist, and must be rent exempt

use crate::crypto::Pubkey;
use crate::ledger::account::{Account, Rent};
use crate::ledger::transaction::AccountMeta;
use std::collections::HashMap;
use thiserror::Error;

/// Failures raised while executing a single instruction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    #[error("Not enough account keys for instruction")]
    NotEnoughAccountKeys,
    #[error("Account {0} is not referenced by the instruction")]
    MissingAccount(Pubkey),
    #[error("Missing required signature for {0}")]
    MissingRequiredSignature(Pubkey),
    #[error("Account not found: {0}")]
    AccountNotFound(Pubkey),
    #[error("Account already in use: {0}")]
    AccountAlreadyInUse(Pubkey),
    #[error("Read-only account modified: {0}")]
    ReadonlyAccountModified(Pubkey),
    #[error("Data of account {0} is owned by another program")]
    ExternalAccountDataModified(Pubkey),
    #[error("Lamports of account {0} are owned by another program")]
    ExternalAccountLamportSpend(Pubkey),
    #[error("Insufficient funds in {account}: have {have}, need {need}")]
    InsufficientFunds { account: Pubkey, have: u64, need: u64 },
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
    #[error("Invalid instruction data: {0}")]
    InvalidInstructionData(String),
    #[error("Custom program error {code}: {message}")]
    Custom { code: u32, message: String },
}

/// Instruction-scoped view of the working accounts
pub struct InvokeContext<'a> {
    program_id: Pubkey,
    accounts: &'a mut HashMap<Pubkey, Account>,
    metas: &'a [AccountMeta],
    rent: &'a Rent,
    logs: &'a mut Vec<String>,
}

impl<'a> InvokeContext<'a> {
    pub fn new(
        program_id: Pubkey,
        accounts: &'a mut HashMap<Pubkey, Account>,
        metas: &'a [AccountMeta],
        rent: &'a Rent,
        logs: &'a mut Vec<String>,
    ) -> Self {
        Self {
            program_id,
            accounts,
            metas,
            rent,
            logs,
        }
    }

    /// Id of the executing program
    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn rent(&self) -> &Rent {
        self.rent
    }

    /// Account metas in instruction order
    pub fn metas(&self) -> &[AccountMeta] {
        self.metas
    }

    /// Key of the account at `index` in the instruction
    pub fn account_key(&self, index: usize) -> Result<Pubkey, InstructionError> {
        self.metas
            .get(index)
            .map(|meta| meta.pubkey)
            .ok_or(InstructionError::NotEnoughAccountKeys)
    }

    /// Whether any meta for `key` is a verified signer
    pub fn is_signer(&self, key: &Pubkey) -> bool {
        self.metas.iter().any(|m| m.pubkey == *key && m.is_signer)
    }

    /// Whether any meta for `key` is writable
    pub fn is_writable(&self, key: &Pubkey) -> bool {
        self.metas.iter().any(|m| m.pubkey == *key && m.is_writable)
    }

    fn ensure_referenced(&self, key: &Pubkey) -> Result<(), InstructionError> {
        if self.metas.iter().any(|m| m.pubkey == *key) {
            Ok(())
        } else {
            Err(InstructionError::MissingAccount(*key))
        }
    }

    fn ensure_writable(&self, key: &Pubkey) -> Result<(), InstructionError> {
        self.ensure_referenced(key)?;
        if self.is_writable(key) {
            Ok(())
        } else {
            Err(InstructionError::ReadonlyAccountModified(*key))
        }
    }

    /// Whether an account exists at `key` (tombstones included)
    pub fn exists(&self, key: &Pubkey) -> bool {
        self.accounts.contains_key(key)
    }

    /// Read an account named by the instruction
    pub fn get(&self, key: &Pubkey) -> Result<&Account, InstructionError> {
        self.ensure_referenced(key)?;
        self.accounts
            .get(key)
            .ok_or(InstructionError::AccountNotFound(*key))
    }

    /// Balance of an account, zero if it does not exist
    pub fn lamports(&self, key: &Pubkey) -> u64 {
        self.accounts.get(key).map(|a| a.lamports).unwrap_or(0)
    }

    /// Mutable data of an account owned by the executing program
    pub fn data_mut(&mut self, key: &Pubkey) -> Result<&mut [u8], InstructionError> {
        self.ensure_writable(key)?;
        let program_id = self.program_id;
        let account = self
            .accounts
            .get_mut(key)
            .ok_or(InstructionError::AccountNotFound(*key))?;
        if account.owner != program_id {
            return Err(InstructionError::ExternalAccountDataModified(*key));
        }
        Ok(account.data.as_mut_slice())
    }

    /// Move lamports between two accounts named by the instruction
    ///
    /// The source must be owned by the executing program, or be a
    /// system-owned account that signed. Missing destinations are created as
    /// plain system accounts.
    pub fn transfer(
        &mut self,
        from: &Pubkey,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<(), InstructionError> {
        self.ensure_writable(from)?;
        self.ensure_writable(to)?;

        let source = self
            .accounts
            .get(from)
            .ok_or(InstructionError::AccountNotFound(*from))?;

        if source.is_system_owned() {
            if !self.is_signer(from) {
                return Err(InstructionError::MissingRequiredSignature(*from));
            }
        } else if source.owner != self.program_id {
            return Err(InstructionError::ExternalAccountLamportSpend(*from));
        }

        if source.lamports < lamports {
            return Err(InstructionError::InsufficientFunds {
                account: *from,
                have: source.lamports,
                need: lamports,
            });
        }
        if lamports == 0 || from == to {
            return Ok(());
        }

        let credited = self
            .lamports(to)
            .checked_add(lamports)
            .ok_or(InstructionError::ArithmeticOverflow)?;

        if let Some(source) = self.accounts.get_mut(from) {
            source.lamports -= lamports;
        }
        self.accounts
            .entry(*to)
            .or_insert_with(|| Account::new_system(0))
            .lamports = credited;

        Ok(())
    }

    /// Move lamports out of a system-owned account that signed
    ///
    /// Used whenever a user funds something. Program-owned accounts are
    /// rejected even though the program could otherwise spend them.
    pub fn transfer_from_signer(
        &mut self,
        from: &Pubkey,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<(), InstructionError> {
        let source = self.get(from)?;
        if !source.is_system_owned() {
            return Err(InstructionError::ExternalAccountLamportSpend(*from));
        }
        if !self.is_signer(from) {
            return Err(InstructionError::MissingRequiredSignature(*from));
        }
        self.transfer(from, to, lamports)
    }

    /// Allocate a new rent-exempt account owned by the executing program
    ///
    /// `payer` must be a signing system account and funds the rent-exempt
    /// minimum for `space` bytes. Returns the lamports deposited.
    pub fn create_account(
        &mut self,
        payer: &Pubkey,
        new_account: &Pubkey,
        space: usize,
    ) -> Result<u64, InstructionError> {
        self.ensure_writable(new_account)?;
        if !self.is_signer(new_account) {
            return Err(InstructionError::MissingRequiredSignature(*new_account));
        }
        if self.exists(new_account) {
            return Err(InstructionError::AccountAlreadyInUse(*new_account));
        }

        let rent = self.rent.minimum_balance(space);
        self.ensure_writable(payer)?;
        let funds = self.get(payer)?.lamports;
        if funds < rent {
            return Err(InstructionError::InsufficientFunds {
                account: *payer,
                have: funds,
                need: rent,
            });
        }
        self.transfer_from_signer(payer, new_account, rent)?;

        // The rent transfer created the account as a plain system account
        let account = self
            .accounts
            .entry(*new_account)
            .or_insert_with(|| Account::new_system(0));
        account.owner = self.program_id;
        account.data = vec![0u8; space];

        Ok(rent)
    }

    /// Append a line to the transaction's program log
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("Program {} log: {}", self.program_id, message);
        self.logs.push(format!("Program log: {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        accounts: HashMap<Pubkey, Account>,
        rent: Rent,
        logs: Vec<String>,
        program_id: Pubkey,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                accounts: HashMap::new(),
                rent: Rent::default(),
                logs: Vec::new(),
                program_id: Pubkey::derive(b"ctx-test-program"),
            }
        }

        fn ctx<'a>(&'a mut self, metas: &'a [AccountMeta]) -> InvokeContext<'a> {
            InvokeContext::new(
                self.program_id,
                &mut self.accounts,
                metas,
                &self.rent,
                &mut self.logs,
            )
        }
    }

    #[test]
    fn test_transfer_requires_signature_for_system_accounts() {
        let mut fx = Fixture::new();
        let alice = Pubkey::derive(b"alice");
        let bob = Pubkey::derive(b"bob");
        fx.accounts.insert(alice, Account::new_system(1_000));

        let unsigned = [AccountMeta::new(alice, false), AccountMeta::new(bob, false)];
        let result = fx.ctx(&unsigned).transfer(&alice, &bob, 10);
        assert_eq!(result, Err(InstructionError::MissingRequiredSignature(alice)));

        let signed = [AccountMeta::new(alice, true), AccountMeta::new(bob, false)];
        fx.ctx(&signed).transfer(&alice, &bob, 10).unwrap();
        assert_eq!(fx.accounts[&alice].lamports, 990);
        assert_eq!(fx.accounts[&bob].lamports, 10);
    }

    #[test]
    fn test_transfer_checks_funds_and_writability() {
        let mut fx = Fixture::new();
        let alice = Pubkey::derive(b"alice");
        let bob = Pubkey::derive(b"bob");
        fx.accounts.insert(alice, Account::new_system(5));

        let metas = [AccountMeta::new(alice, true), AccountMeta::new(bob, false)];
        assert!(matches!(
            fx.ctx(&metas).transfer(&alice, &bob, 6),
            Err(InstructionError::InsufficientFunds { have: 5, need: 6, .. })
        ));

        let readonly = [
            AccountMeta::new(alice, true),
            AccountMeta::new_readonly(bob, false),
        ];
        assert_eq!(
            fx.ctx(&readonly).transfer(&alice, &bob, 1),
            Err(InstructionError::ReadonlyAccountModified(bob))
        );

        let carol = Pubkey::derive(b"carol");
        assert_eq!(
            fx.ctx(&metas).transfer(&alice, &carol, 1),
            Err(InstructionError::MissingAccount(carol))
        );
    }

    #[test]
    fn test_create_account_funds_rent_and_rejects_reuse() {
        let mut fx = Fixture::new();
        let payer = Pubkey::derive(b"payer");
        let record = Pubkey::derive(b"record");
        fx.accounts.insert(payer, Account::new_system(10_000_000));
        let expected_rent = fx.rent.minimum_balance(16);

        let metas = [AccountMeta::new(record, true), AccountMeta::new(payer, true)];
        let deposited = fx.ctx(&metas).create_account(&payer, &record, 16).unwrap();
        assert_eq!(deposited, expected_rent);
        assert_eq!(fx.accounts[&record].lamports, expected_rent);
        assert_eq!(fx.accounts[&record].data.len(), 16);
        assert_eq!(fx.accounts[&record].owner, fx.program_id);
        assert_eq!(fx.accounts[&payer].lamports, 10_000_000 - expected_rent);

        assert_eq!(
            fx.ctx(&metas).create_account(&payer, &record, 16),
            Err(InstructionError::AccountAlreadyInUse(record))
        );
    }

    #[test]
    fn test_program_accounts_cannot_pay_as_signers() {
        let mut fx = Fixture::new();
        let escrow = Pubkey::derive(b"escrow");
        let record = Pubkey::derive(b"record");
        fx.accounts
            .insert(escrow, Account::new_allocated(50_000_000, 8, fx.program_id));

        let metas = [AccountMeta::new(record, true), AccountMeta::new(escrow, true)];
        assert_eq!(
            fx.ctx(&metas).create_account(&escrow, &record, 8),
            Err(InstructionError::ExternalAccountLamportSpend(escrow))
        );
        assert_eq!(fx.accounts[&escrow].lamports, 50_000_000);
    }

    #[test]
    fn test_data_mut_requires_ownership() {
        let mut fx = Fixture::new();
        let foreign = Pubkey::derive(b"foreign");
        fx.accounts.insert(
            foreign,
            Account::new_allocated(1, 8, Pubkey::derive(b"someone-else")),
        );

        let metas = [AccountMeta::new(foreign, false)];
        assert_eq!(
            fx.ctx(&metas).data_mut(&foreign).err(),
            Some(InstructionError::ExternalAccountDataModified(foreign))
        );
    }

    #[test]
    fn test_program_owned_lamports_can_be_spent_without_signature() {
        let mut fx = Fixture::new();
        let escrow = Pubkey::derive(b"escrow");
        let bob = Pubkey::derive(b"bob");
        fx.accounts
            .insert(escrow, Account::new_allocated(500, 8, fx.program_id));

        let metas = [AccountMeta::new(escrow, false), AccountMeta::new(bob, false)];
        let mut ctx = fx.ctx(&metas);
        ctx.transfer(&escrow, &bob, 500).unwrap();
        ctx.log("drained");

        assert_eq!(fx.accounts[&escrow].lamports, 0);
        assert_eq!(fx.accounts[&bob].lamports, 500);
        assert_eq!(fx.logs, vec!["Program log: drained".to_string()]);
    }
}
