//! Canonical types for Bankline
//!
//! These types form the foundation of all ledger and loan operations.
//! Amounts are always integers in the smallest native unit (wei).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Basis-point denominator (10_000 bp = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Days in the interest year
pub const DAYS_PER_YEAR: u128 = 365;

/// Seconds in the interest year (365 days, no leap adjustment)
pub const SECONDS_PER_YEAR: u128 = 365 * 24 * 60 * 60;

/// Decimal places of the native currency
pub const NATIVE_DECIMALS: u32 = 18;

/// One whole native unit expressed in wei
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

// ============================================================================
// Identity Types
// ============================================================================

/// Owner address of an account (hex string, compared case-insensitively)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct AccountId(pub String);

impl AccountId {
    /// Create an account id, normalizing the address to lowercase
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().trim().to_ascii_lowercase())
    }

    /// Parse a `0x`-prefixed hex address
    pub fn parse(address: &str) -> Result<Self> {
        let trimmed = address.trim();
        let valid = trimmed.len() > 2
            && trimmed.starts_with("0x")
            && trimmed[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(CoreError::InvalidAddress {
                address: address.to_string(),
            });
        }
        Ok(Self::new(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Amount Types
// ============================================================================

/// An amount of the native currency in its smallest unit
///
/// Unsigned on purpose: a `Wei` can never represent a negative balance,
/// and every subtraction goes through `checked_sub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Wei(pub u128);

impl Wei {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    /// Whole native units (1 ether = 10^18 wei)
    ///
    /// Takes a `u64` so the product always fits in `u128`.
    pub fn ether(whole: u64) -> Self {
        Self(whole as u128 * WEI_PER_ETHER)
    }

    /// Fraction of a native unit given as `numerator / denominator` ether
    ///
    /// Returns `None` for a zero denominator.
    pub fn checked_ether_fraction(numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        Some(Self(numerator as u128 * WEI_PER_ETHER / denominator as u128))
    }

    /// `checked_ether_fraction` for literal fractions
    ///
    /// A zero denominator is a caller bug and yields zero.
    pub fn ether_fraction(numerator: u64, denominator: u64) -> Self {
        Self::checked_ether_fraction(numerator, denominator).unwrap_or_default()
    }

    /// Sum of `amounts`, `None` on overflow
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::zero(), |acc, amount| acc.checked_add(amount))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(self, multiplier: u128) -> Option<Self> {
        self.0.checked_mul(multiplier).map(Self)
    }

    pub fn checked_div(self, divisor: u128) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        Some(Self(self.0 / divisor))
    }

    /// Multiply by basis points (100 = 1%), truncating
    pub fn basis_points(self, bps: u32) -> Option<Self> {
        self.0
            .checked_mul(bps as u128)
            .map(|v| Self(v / BPS_DENOMINATOR))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Value in whole native units as a decimal
    ///
    /// Returns `None` when the amount exceeds the 96-bit decimal mantissa.
    pub fn to_ether(&self) -> Option<Decimal> {
        let value = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(value, NATIVE_DECIMALS).ok()
    }
}

impl std::fmt::Display for Wei {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        write!(
            f,
            "{}.{:0>width$} ETH",
            whole,
            frac,
            width = NATIVE_DECIMALS as usize
        )
    }
}

// ============================================================================
// Journal Types
// ============================================================================

/// Kind of monetary event recorded in an account's journal
///
/// The declaration order is the wire ordering: `Deposit` is 0, `Withdrawal` is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    LoanApplied,
    LoanApproved,
    LoanRepaid,
    InterestCredited,
}

impl TransactionType {
    /// Stable numeric code of this event kind
    pub fn code(&self) -> u8 {
        match self {
            Self::Deposit => 0,
            Self::Withdrawal => 1,
            Self::LoanApplied => 2,
            Self::LoanApproved => 3,
            Self::LoanRepaid => 4,
            Self::InterestCredited => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Deposit),
            1 => Some(Self::Withdrawal),
            2 => Some(Self::LoanApplied),
            3 => Some(Self::LoanApproved),
            4 => Some(Self::LoanRepaid),
            5 => Some(Self::InterestCredited),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Deposit => "Deposit",
            Self::Withdrawal => "Withdrawal",
            Self::LoanApplied => "Loan Applied",
            Self::LoanApproved => "Loan Approved",
            Self::LoanRepaid => "Loan Repaid",
            Self::InterestCredited => "Interest Credited",
        };
        write!(f, "{}", label)
    }
}

/// One immutable entry of an account's journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub amount: Wei,
    pub timestamp: DateTime<Utc>,
    pub transaction_type: TransactionType,
}

impl TransactionRecord {
    pub fn new(transaction_type: TransactionType, amount: Wei, timestamp: DateTime<Utc>) -> Self {
        Self {
            amount,
            timestamp,
            transaction_type,
        }
    }
}

// ============================================================================
// Loan Types
// ============================================================================

/// Lifecycle position of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// Applied for, awaiting admin approval
    Pending,
    /// Approved and disbursed, awaiting repayment
    Approved,
    /// Fully repaid (terminal)
    Repaid,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Repaid => "Repaid",
        };
        write!(f, "{}", label)
    }
}

/// A collateralized short-term loan owned by a single account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Principal requested
    pub amount: Wei,
    pub created_at: DateTime<Utc>,
    pub due_timestamp: DateTime<Utc>,
    /// Interest fixed when the loan is created, independent of repayment timing
    pub interest_amount: Wei,
    pub approved: bool,
    pub repaid: bool,
}

impl Loan {
    pub fn status(&self) -> LoanStatus {
        if self.repaid {
            LoanStatus::Repaid
        } else if self.approved {
            LoanStatus::Approved
        } else {
            LoanStatus::Pending
        }
    }

    /// Principal plus the precomputed interest
    pub fn amount_due(&self) -> Option<Wei> {
        self.amount.checked_add(self.interest_amount)
    }

    /// Approved, unrepaid and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.approved && !self.repaid && now > self.due_timestamp
    }

    /// Whether the loan still owes money to the bank
    pub fn is_outstanding(&self) -> bool {
        self.approved && !self.repaid
    }
}
