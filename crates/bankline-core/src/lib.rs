//! Bankline Core - Canonical types for the custodial ledger
//!
//! This crate holds the vocabulary shared by every other Bankline crate:
//! - `AccountId` / `Wei`: who owns funds and how much, in the smallest native unit
//! - `Loan`: a collateralized short-term loan and its lifecycle flags
//! - `TransactionRecord`: one immutable entry of an account's journal
//! - `Clock`: the injectable time source used for interest accrual and due dates
//! - `EngineConfig`: admin address, price feed, rate schedule and loan policy
//!
//! # Monetary Invariants
//!
//! 1. Amounts are unsigned integers; no balance can go negative
//! 2. All rate math is integer basis-point math, truncating toward zero
//! 3. Configuration is fixed at construction and never mutated

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use types::*;
