//! Fee treasury
//!
//! A named routing step for deposit fees: every fee goes straight to the
//! admin account through the funds transport. The treasury holds no balance,
//! only a running total of what it has routed.

use std::sync::Arc;

use bankline_core::{AccountId, Wei};
use parking_lot::Mutex;

use crate::guard;
use crate::transport::{FundsTransport, TransferResult};

pub struct FeeTreasury {
    admin: AccountId,
    transport: Arc<dyn FundsTransport>,
    collected: Mutex<Wei>,
}

impl FeeTreasury {
    pub fn new(admin: AccountId, transport: Arc<dyn FundsTransport>) -> Self {
        Self {
            admin,
            transport,
            collected: Mutex::new(Wei::zero()),
        }
    }

    /// Transfer `amount` to the admin account
    ///
    /// A zero fee is a no-op.
    pub async fn collect_fee(&self, amount: Wei) -> TransferResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        guard::external(self.transport.send(&self.admin, amount)).await?;

        let mut collected = self.collected.lock();
        *collected = collected.checked_add(amount).unwrap_or(Wei(u128::MAX));
        Ok(())
    }

    /// Total fees routed to the admin so far
    pub fn total_collected(&self) -> Wei {
        *self.collected.lock()
    }
}

impl std::fmt::Debug for FeeTreasury {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeeTreasury")
            .field("admin", &self.admin)
            .field("collected", &self.total_collected())
            .finish()
    }
}
