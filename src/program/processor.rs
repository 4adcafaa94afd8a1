//! Instruction processor
//!
//! One handler per [`ChannelInstruction`]. Handlers validate everything they
//! can before moving lamports; whatever they do write is discarded by the
//! ledger if they return an error.

use crate::crypto::Pubkey;
use crate::ledger::{InstructionError, InvokeContext, Program};
use crate::program::auth::{authorize, AuthFailure, SignerRoles};
use crate::program::error::ChannelError;
use crate::program::instruction::ChannelInstruction;
use crate::program::state::{AccountRecord, MultisigWallet, PaymentUser};

/// Name the program registers under
pub const PROGRAM_NAME: &str = "paychan-multisig";

pub struct Processor;

impl Processor {
    pub fn process(ctx: &mut InvokeContext<'_>, data: &[u8]) -> Result<(), ChannelError> {
        let instruction = ChannelInstruction::unpack(data)?;
        ctx.log(format!("Instruction: {}", instruction.name()));
        let required = instruction.required_signers();

        match instruction {
            ChannelInstruction::CreatePaymentUser { name } => {
                Self::process_create_payment_user(ctx, required, name)
            }
            ChannelInstruction::CreateMultisigWallet {
                user1_contribution,
                user2_contribution,
            } => Self::process_create_multisig_wallet(
                ctx,
                required,
                user1_contribution,
                user2_contribution,
            ),
            ChannelInstruction::UpdateBalance {
                new_user1_contribution,
                new_user2_contribution,
            } => Self::process_update_balance(
                ctx,
                required,
                new_user1_contribution,
                new_user2_contribution,
            ),
            ChannelInstruction::CloseChannel => Self::process_close_channel(ctx, required),
        }
    }

    fn process_create_payment_user(
        ctx: &mut InvokeContext<'_>,
        required: SignerRoles,
        name: String,
    ) -> Result<(), ChannelError> {
        let record_key = ctx.account_key(0)?;
        let user = ctx.account_key(1)?;

        if ctx.exists(&record_key) {
            return Err(ChannelError::AlreadyInitialized(record_key));
        }

        let record = PaymentUser::new(name, user)?;
        authorize(ctx, required, &[(SignerRoles::USER, user)], &[])
            .map_err(AuthFailure::missing_signer)?;

        Self::ensure_funds(ctx, &user, ctx.rent().minimum_balance(PaymentUser::LEN))?;
        ctx.create_account(&user, &record_key, PaymentUser::LEN)?;
        record.pack_into(ctx.data_mut(&record_key)?)?;

        log::info!("Registered payment user {:?} at {}", record.name, record_key);
        ctx.log(format!("Created payment user {}", record_key));
        Ok(())
    }

    fn process_create_multisig_wallet(
        ctx: &mut InvokeContext<'_>,
        required: SignerRoles,
        user1_contribution: u64,
        user2_contribution: u64,
    ) -> Result<(), ChannelError> {
        let wallet_key = ctx.account_key(0)?;
        let owner = ctx.account_key(1)?;
        let user1 = ctx.account_key(2)?;
        let user2 = ctx.account_key(3)?;

        if ctx.exists(&wallet_key) {
            return Err(ChannelError::AlreadyInitialized(wallet_key));
        }

        authorize(
            ctx,
            required,
            &[
                (SignerRoles::OWNER, owner),
                (SignerRoles::USER1, user1),
                (SignerRoles::USER2, user2),
            ],
            &[],
        )
        .map_err(AuthFailure::missing_signer)?;

        if user1 == user2 {
            return Err(ChannelError::InvalidArgument(
                "user1 and user2 must be different keys".to_string(),
            ));
        }

        let wallet = MultisigWallet {
            owner,
            user1,
            user2,
            user1_contribution,
            user2_contribution,
        };
        if wallet.total_contribution().is_none() {
            return Err(ChannelError::InvalidArgument(
                "contribution sum overflows".to_string(),
            ));
        }

        Self::ensure_funds(ctx, &owner, ctx.rent().minimum_balance(MultisigWallet::LEN))?;
        let rent = ctx.create_account(&owner, &wallet_key, MultisigWallet::LEN)?;

        // Escrow both contributions
        for (participant, amount) in [(user1, user1_contribution), (user2, user2_contribution)] {
            Self::ensure_funds(ctx, &participant, amount)?;
            if amount > 0 {
                ctx.transfer_from_signer(&participant, &wallet_key, amount)?;
            }
        }

        wallet.pack_into(ctx.data_mut(&wallet_key)?)?;

        log::info!(
            "Opened channel {} between {} and {} ({} + {} escrowed, {} rent)",
            wallet_key,
            user1,
            user2,
            user1_contribution,
            user2_contribution,
            rent
        );
        ctx.log(format!(
            "Created multisig wallet {} with contributions {}/{}",
            wallet_key, user1_contribution, user2_contribution
        ));
        Ok(())
    }

    fn process_update_balance(
        ctx: &mut InvokeContext<'_>,
        required: SignerRoles,
        new_user1_contribution: u64,
        new_user2_contribution: u64,
    ) -> Result<(), ChannelError> {
        let wallet_key = ctx.account_key(0)?;
        let user1 = ctx.account_key(1)?;
        let user2 = ctx.account_key(2)?;

        let mut wallet = Self::load_wallet(ctx, &wallet_key)?;

        authorize(
            ctx,
            required,
            &[(SignerRoles::USER1, user1), (SignerRoles::USER2, user2)],
            &[
                (SignerRoles::USER1, wallet.user1),
                (SignerRoles::USER2, wallet.user2),
            ],
        )
        .map_err(AuthFailure::unauthorized)?;

        let stored = wallet.user1_contribution as u128 + wallet.user2_contribution as u128;
        let proposed = new_user1_contribution as u128 + new_user2_contribution as u128;
        if proposed != stored {
            return Err(ChannelError::ContributionSumMismatch {
                stored: stored as u64,
                proposed,
            });
        }

        wallet.user1_contribution = new_user1_contribution;
        wallet.user2_contribution = new_user2_contribution;
        wallet.pack_into(ctx.data_mut(&wallet_key)?)?;

        log::info!(
            "Channel {} rebalanced to {}/{}",
            wallet_key,
            new_user1_contribution,
            new_user2_contribution
        );
        ctx.log(format!(
            "Updated balances to {}/{}",
            new_user1_contribution, new_user2_contribution
        ));
        Ok(())
    }

    fn process_close_channel(
        ctx: &mut InvokeContext<'_>,
        required: SignerRoles,
    ) -> Result<(), ChannelError> {
        let wallet_key = ctx.account_key(0)?;
        let owner = ctx.account_key(1)?;
        let signer = ctx.account_key(2)?;
        let user1 = ctx.account_key(3)?;
        let user2 = ctx.account_key(4)?;

        let wallet = Self::load_wallet(ctx, &wallet_key)?;

        authorize(
            ctx,
            required,
            &[(SignerRoles::OWNER, signer)],
            &[(SignerRoles::OWNER, wallet.owner)],
        )
        .map_err(AuthFailure::unauthorized)?;

        if owner != wallet.owner {
            return Err(ChannelError::UnauthorizedSigner {
                role: SignerRoles::OWNER.role_name(),
                key: owner,
            });
        }
        for (role, expected, actual) in [
            (SignerRoles::USER1, wallet.user1, user1),
            (SignerRoles::USER2, wallet.user2, user2),
        ] {
            if expected != actual {
                return Err(ChannelError::ParticipantMismatch {
                    role: role.role_name(),
                    expected,
                    actual,
                });
            }
        }

        let total = wallet
            .total_contribution()
            .ok_or_else(|| ChannelError::InvalidState("contribution sum overflows".to_string()))?;
        Self::ensure_funds(ctx, &wallet_key, total)?;

        MultisigWallet::write_closed(ctx.data_mut(&wallet_key)?)?;

        ctx.transfer(&wallet_key, &user1, wallet.user1_contribution)?;
        ctx.transfer(&wallet_key, &user2, wallet.user2_contribution)?;
        let remainder = ctx.lamports(&wallet_key);
        ctx.transfer(&wallet_key, &owner, remainder)?;

        log::info!(
            "Closed channel {}: {} to {}, {} to {}, {} to owner",
            wallet_key,
            wallet.user1_contribution,
            user1,
            wallet.user2_contribution,
            user2,
            remainder
        );
        ctx.log(format!("Closed multisig wallet {}", wallet_key));
        Ok(())
    }

    /// Read an active wallet record owned by this program
    fn load_wallet(
        ctx: &InvokeContext<'_>,
        wallet_key: &Pubkey,
    ) -> Result<MultisigWallet, ChannelError> {
        let account = ctx.get(wallet_key).map_err(|e| match e {
            InstructionError::AccountNotFound(key) => {
                ChannelError::InvalidState(format!("wallet {} is not initialized", key))
            }
            other => ChannelError::Host(other),
        })?;
        if account.owner != ctx.program_id() {
            return Err(ChannelError::InvalidAccountOwner(*wallet_key));
        }
        MultisigWallet::unpack(wallet_key, &account.data)
    }

    fn ensure_funds(
        ctx: &InvokeContext<'_>,
        account: &Pubkey,
        need: u64,
    ) -> Result<(), ChannelError> {
        let have = ctx.lamports(account);
        if have < need {
            return Err(ChannelError::InsufficientFunds { have, need });
        }
        Ok(())
    }
}

/// The payment channel program as registered with a [`crate::ledger::Ledger`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelProgram;

impl Program for ChannelProgram {
    fn id(&self) -> Pubkey {
        crate::program::id()
    }

    fn name(&self) -> &str {
        PROGRAM_NAME
    }

    fn process_instruction(
        &self,
        ctx: &mut InvokeContext<'_>,
        data: &[u8],
    ) -> Result<(), InstructionError> {
        Processor::process(ctx, data).map_err(|e| {
            ctx.log(format!("Error: {}", e));
            e.into()
        })
    }
}
