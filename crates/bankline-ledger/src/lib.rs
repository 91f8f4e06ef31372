//! Bankline Ledger - Account balances with lazy interest accrual
//!
//! The ledger is:
//! - Account-keyed by owner address
//! - Accrual-on-touch (pending interest is realized before any balance change)
//! - Journaled (every balance change appends to the `TransactionJournal`)
//! - Check-then-mutate (every precondition is evaluated before the first write)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Interest is a pure function of principal, rate and elapsed time
//! 3. The accrual clock resets whenever the balance changes
//! 4. A failed operation leaves the ledger and journal untouched

pub mod interest;
pub mod journal;

use std::collections::HashMap;

use bankline_core::{
    advance_by_elapsed, elapsed_seconds, AccountId, RateSchedule, TransactionRecord,
    TransactionType, Wei,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use interest::{accrued_interest, projected_interest};
pub use journal::TransactionJournal;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: Wei, required: Wei },

    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

fn overflow(operation: &str) -> LedgerError {
    LedgerError::Overflow {
        operation: operation.to_string(),
    }
}

/// Ledger state of a single account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Principal held in custody, excluding unrealized interest
    pub balance: Wei,
    /// Instant from which pending interest is measured
    pub last_accrual: DateTime<Utc>,
}

impl Account {
    pub fn new(opened_at: DateTime<Utc>) -> Self {
        Self {
            balance: Wei::zero(),
            last_accrual: opened_at,
        }
    }
}

/// Outcome of a successful deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub gross: Wei,
    /// Fee owed to the admin; the caller is responsible for routing it
    pub fee: Wei,
    pub net: Wei,
    pub interest_realized: Wei,
    pub balance_after: Wei,
}

/// Outcome of a successful withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub amount: Wei,
    pub interest_realized: Wei,
    pub balance_after: Wei,
}

/// The Bankline account ledger
///
/// Owns every account's principal and accrual clock. Operations take the
/// current time and the journal explicitly so that the caller controls both
/// the time source and the unit of work.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    rates: RateSchedule,
    accounts: HashMap<AccountId, Account>,
}

impl AccountLedger {
    pub fn new(rates: RateSchedule) -> Self {
        Self {
            rates,
            accounts: HashMap::new(),
        }
    }

    /// Current state of an account, if it has ever been touched
    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Principal balance, excluding pending interest
    pub fn balance(&self, id: &AccountId) -> Wei {
        self.accounts
            .get(id)
            .map(|a| a.balance)
            .unwrap_or(Wei::zero())
    }

    /// Interest accrued since the account's last touch
    ///
    /// Pure read: the same `now` always yields the same value.
    pub fn calculate_interest(&self, id: &AccountId, now: DateTime<Utc>) -> Result<Wei> {
        match self.accounts.get(id) {
            Some(account) => accrued_interest(
                account.balance,
                self.rates.interest_rate_bps,
                elapsed_seconds(account.last_accrual, now),
            )
            .ok_or_else(|| overflow("interest accrual")),
            None => Ok(Wei::zero()),
        }
    }

    /// Principal plus pending interest
    pub fn balance_with_interest(&self, id: &AccountId, now: DateTime<Utc>) -> Result<Wei> {
        let interest = self.calculate_interest(id, now)?;
        self.balance(id)
            .checked_add(interest)
            .ok_or_else(|| overflow("balance with interest"))
    }

    /// Fold pending interest into the balance and restart the accrual clock
    ///
    /// An `InterestCredited` record is appended only when interest is non-zero.
    pub fn realize_interest(
        &mut self,
        id: &AccountId,
        journal: &mut TransactionJournal,
        now: DateTime<Utc>,
    ) -> Result<Wei> {
        let interest = self.calculate_interest(id, now)?;
        let new_balance = self
            .balance(id)
            .checked_add(interest)
            .ok_or_else(|| overflow("interest realization"))?;

        let account = self
            .accounts
            .entry(id.clone())
            .or_insert_with(|| Account::new(now));
        account.balance = new_balance;
        // Only whole seconds were counted; the remainder keeps accruing
        account.last_accrual = advance_by_elapsed(account.last_accrual, now);

        if !interest.is_zero() {
            journal.append(
                id,
                TransactionRecord::new(TransactionType::InterestCredited, interest, now),
            );
        }
        Ok(interest)
    }

    /// Credit a deposit net of the deposit fee
    ///
    /// Pending interest is realized first, then `gross - fee` is credited and
    /// a `Deposit` record for the net amount is appended. The fee is returned
    /// in the receipt and is not journaled against the depositor.
    pub fn deposit(
        &mut self,
        id: &AccountId,
        gross: Wei,
        journal: &mut TransactionJournal,
        now: DateTime<Utc>,
    ) -> Result<DepositReceipt> {
        if gross.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Deposit must be greater than zero".to_string(),
            });
        }

        let fee = self
            .rates
            .deposit_fee(gross)
            .ok_or_else(|| overflow("deposit fee"))?;
        let net = gross
            .checked_sub(fee)
            .ok_or_else(|| overflow("deposit fee"))?;

        // Check the final balance fits before touching anything
        self.balance_with_interest(id, now)?
            .checked_add(net)
            .ok_or_else(|| overflow("deposit"))?;

        let interest_realized = self.realize_interest(id, journal, now)?;
        let account = self
            .accounts
            .entry(id.clone())
            .or_insert_with(|| Account::new(now));
        account.balance = Wei(account.balance.0 + net.0);
        let balance_after = account.balance;

        journal.append(id, TransactionRecord::new(TransactionType::Deposit, net, now));

        Ok(DepositReceipt {
            gross,
            fee,
            net,
            interest_realized,
            balance_after,
        })
    }

    /// Debit a withdrawal
    ///
    /// Fails with `InsufficientBalance` if `amount` exceeds principal plus
    /// pending interest; nothing is mutated in that case.
    pub fn withdraw(
        &mut self,
        id: &AccountId,
        amount: Wei,
        journal: &mut TransactionJournal,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalReceipt> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount {
                message: "Withdrawal must be greater than zero".to_string(),
            });
        }

        let available = self.balance_with_interest(id, now)?;
        let balance_after =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    available,
                    required: amount,
                })?;

        let interest_realized = self.realize_interest(id, journal, now)?;
        let account = self
            .accounts
            .entry(id.clone())
            .or_insert_with(|| Account::new(now));
        account.balance = balance_after;

        journal.append(
            id,
            TransactionRecord::new(TransactionType::Withdrawal, amount, now),
        );

        Ok(WithdrawalReceipt {
            amount,
            interest_realized,
            balance_after,
        })
    }

    /// Copy of an account's state for a later `restore`
    pub fn snapshot(&self, id: &AccountId) -> Option<Account> {
        self.accounts.get(id).cloned()
    }

    /// Put an account back to a previously captured state
    pub fn restore(&mut self, id: &AccountId, snapshot: Option<Account>) {
        match snapshot {
            Some(account) => {
                self.accounts.insert(id.clone(), account);
            }
            None => {
                self.accounts.remove(id);
            }
        }
    }

    /// Sum of all principal held in custody, `None` on overflow
    pub fn total_principal(&self) -> Option<Wei> {
        Wei::checked_sum(self.accounts.values().map(|a| a.balance))
    }
}

impl Default for AccountLedger {
    fn default() -> Self {
        Self::new(RateSchedule::default())
    }
}
