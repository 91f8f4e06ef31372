//! Error types for the banking engine
//!
//! Every error fails its operation atomically: no balance, loan or journal
//! change from the failed operation remains visible.

use bankline_core::{CoreError, Wei};
use bankline_ledger::LedgerError;
use bankline_loans::LoanError;
use bankline_oracle::OracleError;
use thiserror::Error;

use crate::transport::TransferError;

/// Errors returned by `BankingEngine` operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: Wei, required: Wei },

    #[error("Insufficient collateral: balance {balance}, required {required}")]
    InsufficientCollateral { balance: Wei, required: Wei },

    #[error("Unauthorized: {caller} may not perform this operation")]
    Unauthorized { caller: String },

    #[error("Loan {index} not found")]
    LoanNotFound { index: usize },

    #[error("Loan {index} is already approved")]
    AlreadyApproved { index: usize },

    #[error("Loan {index} is not approved")]
    LoanNotApproved { index: usize },

    #[error("Loan {index} is already repaid")]
    AlreadyRepaid { index: usize },

    #[error("Insufficient repayment: paid {paid}, due {due}")]
    InsufficientRepayment { paid: Wei, due: Wei },

    #[error("Price oracle unavailable: {reason}")]
    OracleUnavailable { reason: String },

    #[error("Outbound transfer failed: {reason}")]
    TransferFailed { reason: String },

    #[error("Re-entrant call to {operation} rejected")]
    ReentrantCall { operation: String },

    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl From<LedgerError> for BankError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidAmount { message } => BankError::InvalidAmount { message },
            LedgerError::InsufficientBalance {
                available,
                required,
            } => BankError::InsufficientBalance {
                available,
                required,
            },
            LedgerError::Overflow { operation } => BankError::Overflow { operation },
        }
    }
}

impl From<LoanError> for BankError {
    fn from(e: LoanError) -> Self {
        match e {
            LoanError::InvalidAmount { message } => BankError::InvalidAmount { message },
            LoanError::InsufficientCollateral { balance, required } => {
                BankError::InsufficientCollateral { balance, required }
            }
            LoanError::LoanNotFound { index } => BankError::LoanNotFound { index },
            LoanError::AlreadyApproved { index } => BankError::AlreadyApproved { index },
            LoanError::LoanNotApproved { index } => BankError::LoanNotApproved { index },
            LoanError::AlreadyRepaid { index } => BankError::AlreadyRepaid { index },
            LoanError::InsufficientRepayment { paid, due } => {
                BankError::InsufficientRepayment { paid, due }
            }
            LoanError::Overflow { operation } => BankError::Overflow { operation },
        }
    }
}

impl From<OracleError> for BankError {
    fn from(e: OracleError) -> Self {
        BankError::OracleUnavailable {
            reason: e.to_string(),
        }
    }
}

impl From<TransferError> for BankError {
    fn from(e: TransferError) -> Self {
        BankError::TransferFailed {
            reason: e.to_string(),
        }
    }
}

impl From<CoreError> for BankError {
    fn from(e: CoreError) -> Self {
        BankError::InvalidConfig {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
