//! Bankline Loan Book - Collateralized short-term loans
//!
//! Every loan moves through a linear state machine:
//!
//! ```text
//! Pending --approve--> Approved --repay--> Repaid
//! ```
//!
//! There are no cycles and no cancellation. Loans are stored per account in
//! insertion order; a loan's index never changes and is never reused.
//!
//! The book records state only. Disbursing an approved loan and receiving a
//! repayment are fund movements that the caller performs after the book has
//! been updated.

use std::collections::HashMap;

use bankline_core::{AccountId, Loan, RateSchedule, TransactionRecord, TransactionType, Wei};
use bankline_ledger::{AccountLedger, TransactionJournal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in loan operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanError {
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Insufficient collateral: balance {balance}, required {required}")]
    InsufficientCollateral { balance: Wei, required: Wei },

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

    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: String },
}

pub type Result<T> = std::result::Result<T, LoanError>;

fn overflow(operation: &str) -> LoanError {
    LoanError::Overflow {
        operation: operation.to_string(),
    }
}

/// Outcome of a successful repayment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repayment {
    pub index: usize,
    pub paid: Wei,
    pub due: Wei,
    /// Amount paid above what was due
    pub excess: Wei,
}

/// Loan records for every account
#[derive(Debug, Clone)]
pub struct LoanBook {
    rates: RateSchedule,
    loans: HashMap<AccountId, Vec<Loan>>,
}

impl LoanBook {
    pub fn new(rates: RateSchedule) -> Self {
        Self {
            rates,
            loans: HashMap::new(),
        }
    }

    /// Check that `balance` can back a loan of `amount`
    pub fn check_collateral(&self, balance: Wei, amount: Wei) -> Result<()> {
        let required = self
            .rates
            .required_collateral(amount)
            .ok_or_else(|| overflow("required collateral"))?;
        if balance < required {
            return Err(LoanError::InsufficientCollateral { balance, required });
        }
        Ok(())
    }

    /// Open a new pending loan
    ///
    /// Collateral is checked against the account's ledger balance now; no
    /// funds move. Returns the new loan's index.
    pub fn apply(
        &mut self,
        ledger: &AccountLedger,
        journal: &mut TransactionJournal,
        account: &AccountId,
        amount: Wei,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if amount.is_zero() {
            return Err(LoanError::InvalidAmount {
                message: "Loan amount must be greater than zero".to_string(),
            });
        }

        self.check_collateral(ledger.balance(account), amount)?;

        let interest_amount = self
            .rates
            .loan_interest(amount)
            .ok_or_else(|| overflow("loan interest"))?;
        // The amount due must be representable for the loan to ever be repaid
        amount
            .checked_add(interest_amount)
            .ok_or_else(|| overflow("loan amount due"))?;

        let loan = Loan {
            amount,
            created_at: now,
            due_timestamp: now + self.rates.loan_term(),
            interest_amount,
            approved: false,
            repaid: false,
        };

        let loans = self.loans.entry(account.clone()).or_default();
        loans.push(loan);
        let index = loans.len() - 1;

        journal.append(
            account,
            TransactionRecord::new(TransactionType::LoanApplied, amount, now),
        );

        Ok(index)
    }

    /// Mark a pending loan approved
    ///
    /// With `recheck_collateral` the borrower's current balance must still
    /// back the loan. Returns the approved loan so the caller can disburse it.
    pub fn approve(
        &mut self,
        ledger: &AccountLedger,
        journal: &mut TransactionJournal,
        borrower: &AccountId,
        index: usize,
        recheck_collateral: bool,
        now: DateTime<Utc>,
    ) -> Result<Loan> {
        let loan = self.loan(borrower, index).ok_or(LoanError::LoanNotFound { index })?;
        if loan.approved {
            return Err(LoanError::AlreadyApproved { index });
        }
        if recheck_collateral {
            self.check_collateral(ledger.balance(borrower), loan.amount)?;
        }

        let loan = self
            .loan_mut(borrower, index)
            .ok_or(LoanError::LoanNotFound { index })?;
        loan.approved = true;
        let approved = loan.clone();

        journal.append(
            borrower,
            TransactionRecord::new(TransactionType::LoanApproved, approved.amount, now),
        );

        Ok(approved)
    }

    /// Settle an approved loan
    ///
    /// `payment` must cover principal plus the precomputed interest. The
    /// payment settles the loan only; it is not credited to the ledger.
    pub fn repay(
        &mut self,
        journal: &mut TransactionJournal,
        account: &AccountId,
        index: usize,
        payment: Wei,
        now: DateTime<Utc>,
    ) -> Result<Repayment> {
        if payment.is_zero() {
            return Err(LoanError::InvalidAmount {
                message: "Repayment must be greater than zero".to_string(),
            });
        }

        let loan = self.loan(account, index).ok_or(LoanError::LoanNotFound { index })?;
        if !loan.approved {
            return Err(LoanError::LoanNotApproved { index });
        }
        if loan.repaid {
            return Err(LoanError::AlreadyRepaid { index });
        }
        let due = loan.amount_due().ok_or_else(|| overflow("loan amount due"))?;
        if payment < due {
            return Err(LoanError::InsufficientRepayment { paid: payment, due });
        }

        let loan = self
            .loan_mut(account, index)
            .ok_or(LoanError::LoanNotFound { index })?;
        loan.repaid = true;

        journal.append(
            account,
            TransactionRecord::new(TransactionType::LoanRepaid, payment, now),
        );

        Ok(Repayment {
            index,
            paid: payment,
            due,
            excess: payment.saturating_sub(due),
        })
    }

    /// All loans of an account in application order
    pub fn loans(&self, account: &AccountId) -> &[Loan] {
        self.loans
            .get(account)
            .map(|loans| loans.as_slice())
            .unwrap_or(&[])
    }

    pub fn loan(&self, account: &AccountId, index: usize) -> Option<&Loan> {
        self.loans.get(account).and_then(|loans| loans.get(index))
    }

    fn loan_mut(&mut self, account: &AccountId, index: usize) -> Option<&mut Loan> {
        self.loans
            .get_mut(account)
            .and_then(|loans| loans.get_mut(index))
    }

    /// Principal plus interest still owed on approved, unrepaid loans
    ///
    /// `None` if any amount due, or their total, overflows.
    pub fn outstanding_debt(&self, account: &AccountId) -> Option<Wei> {
        self.loans(account)
            .iter()
            .filter(|loan| loan.is_outstanding())
            .try_fold(Wei::zero(), |total, loan| total.checked_add(loan.amount_due()?))
    }

    /// Approved, unrepaid loans past their due date, with their indices
    pub fn overdue_loans(&self, account: &AccountId, now: DateTime<Utc>) -> Vec<(usize, Loan)> {
        self.loans(account)
            .iter()
            .enumerate()
            .filter(|(_, loan)| loan.is_overdue(now))
            .map(|(index, loan)| (index, loan.clone()))
            .collect()
    }

    /// Copy of an account's loans for a later `restore`
    pub fn snapshot(&self, account: &AccountId) -> Option<Vec<Loan>> {
        self.loans.get(account).cloned()
    }

    pub fn restore(&mut self, account: &AccountId, snapshot: Option<Vec<Loan>>) {
        match snapshot {
            Some(loans) => {
                self.loans.insert(account.clone(), loans);
            }
            None => {
                self.loans.remove(account);
            }
        }
    }
}

impl Default for LoanBook {
    fn default() -> Self {
        Self::new(RateSchedule::default())
    }
}
