//! Outbound fund transfers
//!
//! Funds leaving custody (withdrawals, fees, loan disbursements, refunds) go
//! through a `FundsTransport`. A transfer either completes or fails as a
//! whole; the engine reverts its own state when a transfer fails.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bankline_core::{AccountId, Wei};
use parking_lot::RwLock;
use thiserror::Error;

/// Errors reported by a transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Transfer of {amount} to {to} rejected: {reason}")]
    Rejected {
        to: String,
        amount: Wei,
        reason: String,
    },

    #[error("Recipient {to} balance overflow")]
    Overflow { to: String },
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Sends funds out of custody
///
/// Implementations may call back into the engine from `send`. Such calls run
/// in the engine's task and see the state already committed by the operation
/// that triggered the transfer; mutating calls are rejected as re-entrant.
/// A callback must not be handed to a separately spawned task and awaited,
/// since that task would wait on the account the transfer is in flight for.
#[async_trait]
pub trait FundsTransport: Send + Sync {
    async fn send(&self, to: &AccountId, amount: Wei) -> TransferResult<()>;
}

#[derive(Debug, Default)]
struct CustodyState {
    wallets: HashMap<AccountId, Wei>,
    failing: HashSet<AccountId>,
    transfers: usize,
}

/// In-memory external wallets
///
/// Tracks how much each recipient has received and can be told to reject
/// transfers to specific recipients. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustody {
    state: Arc<RwLock<CustodyState>>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total received by `account` outside the ledger
    pub fn wallet_balance(&self, account: &AccountId) -> Wei {
        self.state
            .read()
            .wallets
            .get(account)
            .copied()
            .unwrap_or(Wei::zero())
    }

    /// Reject every transfer to `account` until cleared
    pub fn fail_transfers_to(&self, account: &AccountId) {
        self.state.write().failing.insert(account.clone());
    }

    pub fn clear_failures(&self) {
        self.state.write().failing.clear();
    }

    /// Number of completed transfers
    pub fn transfer_count(&self) -> usize {
        self.state.read().transfers
    }
}

#[async_trait]
impl FundsTransport for InMemoryCustody {
    async fn send(&self, to: &AccountId, amount: Wei) -> TransferResult<()> {
        let mut state = self.state.write();
        if state.failing.contains(to) {
            return Err(TransferError::Rejected {
                to: to.to_string(),
                amount,
                reason: "recipient refused transfer".to_string(),
            });
        }

        let current = state.wallets.get(to).copied().unwrap_or(Wei::zero());
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow { to: to.to_string() })?;
        state.wallets.insert(to.clone(), updated);
        state.transfers += 1;
        Ok(())
    }
}
