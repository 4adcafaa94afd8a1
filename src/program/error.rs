//! Error types for the payment channel program
//!
//! Every rejection aborts the whole transaction. Program-level errors carry a
//! stable numeric [`ErrorCode`] so clients can tell them apart after they
//! cross the ledger boundary as [`InstructionError::Custom`].

use crate::crypto::Pubkey;
use crate::ledger::InstructionError;
use thiserror::Error;

/// Stable numeric codes for program errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    InvalidNameLength = 6000,
    InvalidArgument = 6001,
    InvalidInstructionData = 6002,
    MissingSigner = 6003,
    UnauthorizedSigner = 6004,
    ParticipantMismatch = 6005,
    AlreadyInitialized = 6006,
    InvalidState = 6007,
    InsufficientFunds = 6008,
    ContributionSumMismatch = 6009,
    AccountTypeMismatch = 6010,
    InvalidAccountOwner = 6011,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::InvalidNameLength,
        ErrorCode::InvalidArgument,
        ErrorCode::InvalidInstructionData,
        ErrorCode::MissingSigner,
        ErrorCode::UnauthorizedSigner,
        ErrorCode::ParticipantMismatch,
        ErrorCode::AlreadyInitialized,
        ErrorCode::InvalidState,
        ErrorCode::InsufficientFunds,
        ErrorCode::ContributionSumMismatch,
        ErrorCode::AccountTypeMismatch,
        ErrorCode::InvalidAccountOwner,
    ];

    /// Numeric value as seen in `InstructionError::Custom`
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Decode a numeric value back into a code
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

/// Errors raised by the payment channel program
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Invalid name length {len}: must be 1-{max} bytes")]
    InvalidNameLength { len: usize, max: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid instruction data: {0}")]
    InvalidInstructionData(String),
    #[error("Missing signer for {role}: {key}")]
    MissingSigner { role: &'static str, key: Pubkey },
    #[error("Unauthorized signer for {role}: {key}")]
    UnauthorizedSigner { role: &'static str, key: Pubkey },
    #[error("Participant mismatch for {role}: expected {expected}, got {actual}")]
    ParticipantMismatch {
        role: &'static str,
        expected: Pubkey,
        actual: Pubkey,
    },
    #[error("Account already initialized: {0}")]
    AlreadyInitialized(Pubkey),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Contribution sum mismatch: stored {stored}, proposed {proposed}")]
    ContributionSumMismatch { stored: u64, proposed: u128 },
    #[error("Account {0} holds a different record type")]
    AccountTypeMismatch(Pubkey),
    #[error("Account {0} is not owned by this program")]
    InvalidAccountOwner(Pubkey),
    #[error(transparent)]
    Host(#[from] InstructionError),
}

impl ChannelError {
    /// Program error code; `None` for host failures passed through
    pub fn code(&self) -> Option<ErrorCode> {
        let code = match self {
            ChannelError::InvalidNameLength { .. } => ErrorCode::InvalidNameLength,
            ChannelError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            ChannelError::InvalidInstructionData(_) => ErrorCode::InvalidInstructionData,
            ChannelError::MissingSigner { .. } => ErrorCode::MissingSigner,
            ChannelError::UnauthorizedSigner { .. } => ErrorCode::UnauthorizedSigner,
            ChannelError::ParticipantMismatch { .. } => ErrorCode::ParticipantMismatch,
            ChannelError::AlreadyInitialized(_) => ErrorCode::AlreadyInitialized,
            ChannelError::InvalidState(_) => ErrorCode::InvalidState,
            ChannelError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            ChannelError::ContributionSumMismatch { .. } => ErrorCode::ContributionSumMismatch,
            ChannelError::AccountTypeMismatch(_) => ErrorCode::AccountTypeMismatch,
            ChannelError::InvalidAccountOwner(_) => ErrorCode::InvalidAccountOwner,
            ChannelError::Host(_) => return None,
        };
        Some(code)
    }
}

impl From<ChannelError> for InstructionError {
    fn from(err: ChannelError) -> Self {
        if let ChannelError::Host(inner) = err {
            return inner;
        }
        InstructionError::Custom {
            code: err.code().map(ErrorCode::code).unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_and_are_unique() {
        for (i, code) in ErrorCode::ALL.iter().enumerate() {
            assert_eq!(code.code(), 6000 + i as u32);
            assert_eq!(ErrorCode::from_code(code.code()), Some(*code));
        }
        assert_eq!(ErrorCode::from_code(42), None);
    }

    #[test]
    fn test_program_errors_become_custom() {
        let err: InstructionError = ChannelError::InvalidState("closed".to_string()).into();
        assert_eq!(
            err,
            InstructionError::Custom {
                code: ErrorCode::InvalidState.code(),
                message: "Invalid state: closed".to_string(),
            }
        );
    }

    #[test]
    fn test_host_errors_pass_through() {
        let host = InstructionError::NotEnoughAccountKeys;
        let err: InstructionError = ChannelError::from(host.clone()).into();
        assert_eq!(err, host);
        assert_eq!(ChannelError::Host(host).code(), None);
    }
}
