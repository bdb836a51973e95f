use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NoWallet,
    UserRejected,
    InvalidAddress,
    Read,
    NotFound,
    NoSigner,
    Submission,
    Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionFailure {
    #[error("rejected by user")]
    Rejected,
    #[error("function `{0}` is not part of the contract interface")]
    UnknownFunction(String),
    #[error("invalid arguments for `{function}`: {reason}")]
    InvalidArguments { function: String, reason: String },
    #[error("{0}")]
    Rpc(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationFailure {
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },
    #[error("transaction {tx_hash} not confirmed within {waited_secs}s")]
    TimedOut { tx_hash: B256, waited_secs: u64 },
    #[error("receipt lookup for {tx_hash} failed: {reason}")]
    Receipt { tx_hash: B256, reason: String },
}

/// Every failure the contract façade surfaces to a view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    #[error("no wallet available")]
    NoWallet,
    #[error("request rejected by user")]
    UserRejected,
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("read `{function}` failed: {reason}")]
    Read { function: String, reason: String },
    #[error("beneficiary {0} not found")]
    NotFound(Address),
    #[error("no signing account connected")]
    NoSigner,
    #[error("transaction submission failed: {0}")]
    Submission(SubmissionFailure),
    #[error("transaction confirmation failed: {0}")]
    Confirmation(ConfirmationFailure),
}

impl FacadeError {
    pub fn read(function: impl Into<String>, reason: impl ToString) -> Self {
        Self::Read {
            function: function.into(),
            reason: reason.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoWallet => ErrorCode::NoWallet,
            Self::UserRejected => ErrorCode::UserRejected,
            Self::InvalidAddress(_) => ErrorCode::InvalidAddress,
            Self::Read { .. } => ErrorCode::Read,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NoSigner => ErrorCode::NoSigner,
            Self::Submission(_) => ErrorCode::Submission,
            Self::Confirmation(_) => ErrorCode::Confirmation,
        }
    }

    /// Short label for status lines; the `Display` impl carries the detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoWallet => "no wallet",
            Self::UserRejected | Self::Submission(SubmissionFailure::Rejected) => {
                "rejected by user"
            }
            Self::InvalidAddress(_) => "bad address",
            Self::Read { .. } => "read failed",
            Self::NotFound(_) => "not found",
            Self::NoSigner => "no signer",
            Self::Submission(_) => "transaction failed",
            Self::Confirmation(ConfirmationFailure::Reverted { .. }) => "transaction reverted",
            Self::Confirmation(ConfirmationFailure::TimedOut { .. }) => {
                "confirmation timed out"
            }
            Self::Confirmation(ConfirmationFailure::Receipt { .. }) => "transaction failed",
        }
    }
}
