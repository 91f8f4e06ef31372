//! Read models returned by the engine

use bankline_core::{AccountId, Wei};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account: AccountId,
    /// Principal held in custody
    pub principal: Wei,
    /// Interest accrued since the last touch, not yet realized
    pub pending_interest: Wei,
    /// `principal + pending_interest`
    pub balance: Wei,
    /// Largest loan the principal could back as collateral
    pub borrowing_capacity: Wei,
    pub loan_count: usize,
    pub pending_loans: usize,
    /// Principal plus interest owed on approved, unrepaid loans
    pub outstanding_debt: Wei,
    pub overdue_loans: usize,
    pub history_len: usize,
    pub as_of: DateTime<Utc>,
}

/// Outcome of a loan repayment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub index: usize,
    pub paid: Wei,
    pub due: Wei,
    /// Excess sent back to the borrower; zero unless the policy refunds overpayment
    pub refunded: Wei,
}

impl RepaymentReceipt {
    /// Amount paid above what was due, whether refunded or kept
    pub fn excess(&self) -> Wei {
        self.paid.saturating_sub(self.due)
    }
}
