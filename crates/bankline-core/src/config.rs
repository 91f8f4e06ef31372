//! Engine configuration
//!
//! Everything here is fixed when the engine is constructed: the admin
//! address, the price feed, the rate schedule and the loan policy switches.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{AccountId, Wei, BPS_DENOMINATOR, DAYS_PER_YEAR};

/// Chainlink ETH/USD aggregator on Sepolia
pub const DEFAULT_PRICE_FEED: &str = "0x694AA1769357215DE4FAC081bf1f309aDC325306";

/// Placeholder admin used by development configurations
pub const DEVELOPMENT_ADMIN: &str = "0x00000000000000000000000000000000000ad1e1";

/// Basis-point rates and loan terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSchedule {
    /// Fee taken from every deposit (100 = 1%)
    #[serde(default = "default_deposit_fee_bps")]
    pub deposit_fee_bps: u32,

    /// Annual interest paid on balances (500 = 5%)
    #[serde(default = "default_interest_rate_bps")]
    pub interest_rate_bps: u32,

    /// Annual rate charged on loans (800 = 8%)
    #[serde(default = "default_loan_interest_rate_bps")]
    pub loan_interest_rate_bps: u32,

    /// Fixed loan term in days
    #[serde(default = "default_loan_term_days")]
    pub loan_term_days: u32,

    /// Collateral required per unit borrowed (5000 = half the loan)
    #[serde(default = "default_collateral_ratio_bps")]
    pub collateral_ratio_bps: u32,
}

impl Default for RateSchedule {
    fn default() -> Self {
        Self {
            deposit_fee_bps: default_deposit_fee_bps(),
            interest_rate_bps: default_interest_rate_bps(),
            loan_interest_rate_bps: default_loan_interest_rate_bps(),
            loan_term_days: default_loan_term_days(),
            collateral_ratio_bps: default_collateral_ratio_bps(),
        }
    }
}

impl RateSchedule {
    /// Fee charged on a gross deposit
    pub fn deposit_fee(&self, gross: Wei) -> Option<Wei> {
        gross.basis_points(self.deposit_fee_bps)
    }

    /// Interest owed on a loan over the full fixed term
    ///
    /// `amount * rate_bps * term_days / (10_000 * 365)`, truncating.
    pub fn loan_interest(&self, amount: Wei) -> Option<Wei> {
        let numerator = amount
            .0
            .checked_mul(self.loan_interest_rate_bps as u128)?
            .checked_mul(self.loan_term_days as u128)?;
        Some(Wei(numerator / (BPS_DENOMINATOR * DAYS_PER_YEAR)))
    }

    /// Minimum balance an account must hold to borrow `amount`
    pub fn required_collateral(&self, amount: Wei) -> Option<Wei> {
        amount.basis_points(self.collateral_ratio_bps)
    }

    /// Largest loan a balance can back
    pub fn max_loan(&self, balance: Wei) -> Option<Wei> {
        if self.collateral_ratio_bps == 0 {
            return None;
        }
        balance
            .checked_mul(BPS_DENOMINATOR)
            .and_then(|v| v.checked_div(self.collateral_ratio_bps as u128))
    }

    pub fn loan_term(&self) -> Duration {
        Duration::days(self.loan_term_days as i64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.deposit_fee_bps as u128 > BPS_DENOMINATOR {
            return Err(CoreError::InvalidConfig {
                message: format!(
                    "deposit_fee_bps {} exceeds {}",
                    self.deposit_fee_bps, BPS_DENOMINATOR
                ),
            });
        }
        if self.loan_term_days == 0 {
            return Err(CoreError::InvalidConfig {
                message: "loan_term_days must be greater than zero".to_string(),
            });
        }
        if self.collateral_ratio_bps == 0 {
            return Err(CoreError::InvalidConfig {
                message: "collateral_ratio_bps must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Policy switches for behavior the ledger leaves open
///
/// Both default to `false`, which reproduces the observed behavior:
/// collateral is only checked when applying, and overpayment is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPolicy {
    /// Re-check collateral against the borrower's balance at approval time
    #[serde(default)]
    pub recheck_collateral_on_approval: bool,

    /// Send any repayment above the amount due back to the borrower
    #[serde(default)]
    pub refund_overpayment: bool,
}

/// Construction-time configuration of a banking engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Receives deposit fees and is the only account allowed to approve loans
    #[serde(default = "default_admin")]
    pub admin: AccountId,

    /// Address of the ETH/USD price feed
    #[serde(default = "default_price_feed")]
    pub price_feed: String,

    #[serde(default)]
    pub rates: RateSchedule,

    #[serde(default)]
    pub loan_policy: LoanPolicy,
}

impl EngineConfig {
    pub fn new(admin: AccountId, price_feed: impl Into<String>) -> Self {
        Self {
            admin,
            price_feed: price_feed.into(),
            rates: RateSchedule::default(),
            loan_policy: LoanPolicy::default(),
        }
    }

    /// Configuration for local runs and tests
    pub fn development() -> Self {
        Self::new(AccountId::new(DEVELOPMENT_ADMIN), DEFAULT_PRICE_FEED)
    }

    pub fn with_rates(mut self, rates: RateSchedule) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_loan_policy(mut self, policy: LoanPolicy) -> Self {
        self.loan_policy = policy;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin.as_str().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "admin address must be set".to_string(),
            });
        }
        if self.price_feed.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "price_feed address must be set".to_string(),
            });
        }
        self.rates.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::development()
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_deposit_fee_bps() -> u32 {
    100
}

fn default_interest_rate_bps() -> u32 {
    500
}

fn default_loan_interest_rate_bps() -> u32 {
    800
}

fn default_loan_term_days() -> u32 {
    30
}

fn default_collateral_ratio_bps() -> u32 {
    5_000
}

fn default_admin() -> AccountId {
    AccountId::new(DEVELOPMENT_ADMIN)
}

fn default_price_feed() -> String {
    DEFAULT_PRICE_FEED.to_string()
}
