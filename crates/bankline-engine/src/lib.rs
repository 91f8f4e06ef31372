//! Bankline Engine - Custodial banking operations
//!
//! The engine composes the account ledger, the transaction journal and the
//! loan book into atomic operations:
//!
//! - **Deposits** credit the net amount and route the fee to the admin
//! - **Withdrawals** debit the ledger and send funds to the owner
//! - **Loans** are applied for against collateral, approved by the admin,
//!   disbursed directly and repaid with fixed interest
//!
//! Operations on the same account are serialized. Any outbound transfer
//! failure reverts the whole operation, and calls back into the engine from
//! inside a transfer cannot mutate state.

pub mod engine;
pub mod error;
mod guard;
pub mod summary;
pub mod transport;
pub mod treasury;

pub use engine::BankingEngine;
pub use error::{BankError, Result};
pub use summary::{AccountSummary, RepaymentReceipt};
pub use transport::{FundsTransport, InMemoryCustody, TransferError, TransferResult};
pub use treasury::FeeTreasury;

pub use bankline_ledger::{DepositReceipt, WithdrawalReceipt};
