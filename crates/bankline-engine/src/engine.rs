//! The banking engine
//!
//! Every public operation follows the same shape:
//!
//! 1. Reject re-entrant calls and invalid inputs
//! 2. Take the account's operation gate
//! 3. Check and apply effects on the books under the books lock, then release it
//! 4. Perform outbound transfers (interactions)
//! 5. If a transfer fails, restore the account's books from the snapshot taken in step 3
//!
//! The gate stays held through step 5, so no other mutation of the account
//! can observe or build on effects that are about to be reverted.

use std::sync::Arc;

use bankline_core::{
    AccountId, Clock, EngineConfig, Loan, SystemClock, TransactionRecord, Wei,
};
use bankline_ledger::{Account, AccountLedger, DepositReceipt, TransactionJournal, WithdrawalReceipt};
use bankline_loans::LoanBook;
use bankline_oracle::{OracleAdapter, PriceOracle};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{BankError, Result};
use crate::guard::{self, AccountGates};
use crate::summary::{AccountSummary, RepaymentReceipt};
use crate::transport::FundsTransport;
use crate::treasury::FeeTreasury;

/// Ledger, journal and loan book, mutated together
struct Books {
    ledger: AccountLedger,
    journal: TransactionJournal,
    loans: LoanBook,
}

/// Pre-operation state of one account
struct AccountSnapshot {
    account: AccountId,
    ledger: Option<Account>,
    loans: Option<Vec<Loan>>,
    journal_len: usize,
}

impl Books {
    fn snapshot(&self, account: &AccountId) -> AccountSnapshot {
        AccountSnapshot {
            account: account.clone(),
            ledger: self.ledger.snapshot(account),
            loans: self.loans.snapshot(account),
            journal_len: self.journal.len(account),
        }
    }

    fn restore(&mut self, snapshot: AccountSnapshot) {
        self.ledger.restore(&snapshot.account, snapshot.ledger);
        self.loans.restore(&snapshot.account, snapshot.loans);
        self.journal.truncate(&snapshot.account, snapshot.journal_len);
    }
}

/// The Bankline banking engine
///
/// Custodial ledger with a deposit fee, lazy interest accrual and
/// admin-approved collateralized loans. Safe to share across tasks.
///
/// Incoming value (deposits and loan repayments) is passed in as an amount
/// already attached to the call; when an operation fails, that value is
/// considered returned to the caller.
pub struct BankingEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    books: RwLock<Books>,
    gates: AccountGates,
    treasury: FeeTreasury,
    oracle: OracleAdapter,
    transport: Arc<dyn FundsTransport>,
}

impl BankingEngine {
    /// Create an engine on the wall clock
    pub fn new(
        config: EngineConfig,
        price_source: Arc<dyn PriceOracle>,
        transport: Arc<dyn FundsTransport>,
    ) -> Result<Self> {
        Self::with_clock(config, price_source, transport, Arc::new(SystemClock))
    }

    /// Create an engine on a specific clock
    pub fn with_clock(
        config: EngineConfig,
        price_source: Arc<dyn PriceOracle>,
        transport: Arc<dyn FundsTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let books = Books {
            ledger: AccountLedger::new(config.rates.clone()),
            journal: TransactionJournal::new(),
            loans: LoanBook::new(config.rates.clone()),
        };

        info!(
            admin = %config.admin,
            price_feed = %config.price_feed,
            deposit_fee_bps = config.rates.deposit_fee_bps,
            interest_rate_bps = config.rates.interest_rate_bps,
            "Banking engine initialized"
        );

        Ok(Self {
            treasury: FeeTreasury::new(config.admin.clone(), transport.clone()),
            oracle: OracleAdapter::new(config.price_feed.clone(), price_source),
            config,
            clock,
            books: RwLock::new(books),
            gates: AccountGates::new(),
            transport,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn admin(&self) -> &AccountId {
        &self.config.admin
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Mutating operations
    // ========================================================================

    /// Deposit `value` into the caller's account
    ///
    /// The deposit fee is routed to the admin; the rest is credited.
    pub async fn deposit(&self, caller: &AccountId, value: Wei) -> Result<DepositReceipt> {
        guard::ensure_not_reentrant("deposit")?;
        require_positive(value, "Deposit")?;

        let _gate = self.gates.acquire(caller).await;
        let now = self.clock.now();

        let (receipt, snapshot) = {
            let mut books = self.books.write().await;
            let snapshot = books.snapshot(caller);
            let Books {
                ledger, journal, ..
            } = &mut *books;
            let receipt = ledger.deposit(caller, value, journal, now)?;
            (receipt, snapshot)
        };
        log_interest(caller, receipt.interest_realized);

        if let Err(e) = self.treasury.collect_fee(receipt.fee).await {
            self.revert(snapshot, "deposit").await;
            return Err(e.into());
        }

        info!(
            account = %caller,
            gross = %receipt.gross,
            fee = %receipt.fee,
            net = %receipt.net,
            balance = %receipt.balance_after,
            "Deposit committed"
        );
        Ok(receipt)
    }

    /// Withdraw `amount` from the caller's account to the caller
    pub async fn withdraw(&self, caller: &AccountId, amount: Wei) -> Result<WithdrawalReceipt> {
        guard::ensure_not_reentrant("withdraw")?;
        require_positive(amount, "Withdrawal")?;

        let _gate = self.gates.acquire(caller).await;
        let now = self.clock.now();

        let (receipt, snapshot) = {
            let mut books = self.books.write().await;
            let snapshot = books.snapshot(caller);
            let Books {
                ledger, journal, ..
            } = &mut *books;
            let receipt = ledger.withdraw(caller, amount, journal, now)?;
            (receipt, snapshot)
        };
        log_interest(caller, receipt.interest_realized);

        if let Err(e) = self.send(caller, amount).await {
            self.revert(snapshot, "withdraw").await;
            return Err(e);
        }

        info!(
            account = %caller,
            amount = %amount,
            balance = %receipt.balance_after,
            "Withdrawal committed"
        );
        Ok(receipt)
    }

    /// Apply for a loan backed by the caller's balance
    ///
    /// Returns the loan's index. No funds move until the admin approves it.
    pub async fn apply_for_loan(&self, caller: &AccountId, amount: Wei) -> Result<usize> {
        guard::ensure_not_reentrant("apply_for_loan")?;
        require_positive(amount, "Loan amount")?;

        let _gate = self.gates.acquire(caller).await;
        let now = self.clock.now();

        let mut books = self.books.write().await;
        let Books {
            ledger,
            journal,
            loans,
        } = &mut *books;
        let index = loans.apply(ledger, journal, caller, amount, now)?;

        info!(account = %caller, index, amount = %amount, "Loan application recorded");
        Ok(index)
    }

    /// Approve `borrower`'s loan at `index` and disburse it
    ///
    /// Only the admin may approve. The principal is sent straight to the
    /// borrower and does not pass through the ledger balance.
    pub async fn approve_loan(
        &self,
        caller: &AccountId,
        borrower: &AccountId,
        index: usize,
    ) -> Result<Loan> {
        guard::ensure_not_reentrant("approve_loan")?;
        if caller != &self.config.admin {
            warn!(caller = %caller, borrower = %borrower, index, "Rejected loan approval from non-admin");
            return Err(BankError::Unauthorized {
                caller: caller.to_string(),
            });
        }

        let _gate = self.gates.acquire(borrower).await;
        let now = self.clock.now();
        let recheck = self.config.loan_policy.recheck_collateral_on_approval;

        let (loan, snapshot) = {
            let mut books = self.books.write().await;
            let snapshot = books.snapshot(borrower);
            let Books {
                ledger,
                journal,
                loans,
            } = &mut *books;
            let loan = loans.approve(ledger, journal, borrower, index, recheck, now)?;
            (loan, snapshot)
        };

        if let Err(e) = self.send(borrower, loan.amount).await {
            self.revert(snapshot, "approve_loan").await;
            return Err(e);
        }

        info!(
            borrower = %borrower,
            index,
            amount = %loan.amount,
            due = %loan.due_timestamp,
            "Loan approved and disbursed"
        );
        Ok(loan)
    }

    /// Repay the caller's loan at `index` with `payment`
    ///
    /// Any excess over the amount due is kept unless the loan policy refunds it.
    pub async fn repay_loan(
        &self,
        caller: &AccountId,
        index: usize,
        payment: Wei,
    ) -> Result<RepaymentReceipt> {
        guard::ensure_not_reentrant("repay_loan")?;
        require_positive(payment, "Repayment")?;

        let _gate = self.gates.acquire(caller).await;
        let now = self.clock.now();

        let (repayment, snapshot) = {
            let mut books = self.books.write().await;
            let snapshot = books.snapshot(caller);
            let Books { journal, loans, .. } = &mut *books;
            let repayment = loans.repay(journal, caller, index, payment, now)?;
            (repayment, snapshot)
        };

        let refunded = if self.config.loan_policy.refund_overpayment && !repayment.excess.is_zero()
        {
            if let Err(e) = self.send(caller, repayment.excess).await {
                self.revert(snapshot, "repay_loan").await;
                return Err(e);
            }
            repayment.excess
        } else {
            Wei::zero()
        };

        info!(
            account = %caller,
            index,
            paid = %repayment.paid,
            due = %repayment.due,
            refunded = %refunded,
            "Loan repaid"
        );
        Ok(RepaymentReceipt {
            index,
            paid: repayment.paid,
            due: repayment.due,
            refunded,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Interest accrued on `account` since its last touch
    pub async fn calculate_interest(&self, account: &AccountId) -> Result<Wei> {
        let now = self.clock.now();
        let books = self.books.read().await;
        Ok(books.ledger.calculate_interest(account, now)?)
    }

    /// Principal plus pending interest
    pub async fn account_balance(&self, account: &AccountId) -> Result<Wei> {
        let now = self.clock.now();
        let books = self.books.read().await;
        Ok(books.ledger.balance_with_interest(account, now)?)
    }

    /// Loans of `account` in application order
    pub async fn user_loans(&self, account: &AccountId) -> Vec<Loan> {
        self.books.read().await.loans.loans(account).to_vec()
    }

    /// Journal of `account` in chronological order
    pub async fn transaction_history(&self, account: &AccountId) -> Vec<TransactionRecord> {
        self.books.read().await.journal.history(account).to_vec()
    }

    /// Latest ETH/USD price, scaled by the feed's decimals
    pub async fn eth_usd_price(&self) -> Result<Decimal> {
        Ok(self.oracle.price().await?)
    }

    /// Balance (with pending interest) valued in USD at the oracle price
    pub async fn balance_in_usd(&self, account: &AccountId) -> Result<Decimal> {
        let balance = self.account_balance(account).await?;
        let price = self.eth_usd_price().await?;
        let ether = balance.to_ether().ok_or_else(|| BankError::Overflow {
            operation: "balance valuation".to_string(),
        })?;
        ether.checked_mul(price).ok_or_else(|| BankError::Overflow {
            operation: "balance valuation".to_string(),
        })
    }

    /// Consistent snapshot of an account's position
    pub async fn account_summary(&self, account: &AccountId) -> Result<AccountSummary> {
        let now = self.clock.now();
        let books = self.books.read().await;

        let pending_interest = books.ledger.calculate_interest(account, now)?;
        let balance = books.ledger.balance_with_interest(account, now)?;
        let principal = books.ledger.balance(account);
        let loans = books.loans.loans(account);
        let outstanding_debt = books.loans.outstanding_debt(account).ok_or_else(|| {
            BankError::Overflow {
                operation: "outstanding debt".to_string(),
            }
        })?;
        let borrowing_capacity = self.config.rates.max_loan(principal).ok_or_else(|| {
            BankError::Overflow {
                operation: "borrowing capacity".to_string(),
            }
        })?;

        Ok(AccountSummary {
            account: account.clone(),
            principal,
            pending_interest,
            balance,
            borrowing_capacity,
            loan_count: loans.len(),
            pending_loans: loans.iter().filter(|l| !l.approved).count(),
            outstanding_debt,
            overdue_loans: books.loans.overdue_loans(account, now).len(),
            history_len: books.journal.len(account),
            as_of: now,
        })
    }

    /// Total deposit fees routed to the admin
    pub fn fees_collected(&self) -> Wei {
        self.treasury.total_collected()
    }

    /// Sum of all principal held in custody
    pub async fn total_custody(&self) -> Result<Wei> {
        self.books
            .read()
            .await
            .ledger
            .total_principal()
            .ok_or_else(|| BankError::Overflow {
                operation: "total custody".to_string(),
            })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn send(&self, to: &AccountId, amount: Wei) -> Result<()> {
        guard::external(self.transport.send(to, amount)).await?;
        Ok(())
    }

    async fn revert(&self, snapshot: AccountSnapshot, operation: &str) {
        warn!(
            account = %snapshot.account,
            operation,
            "Outbound transfer failed, reverting operation"
        );
        self.books.write().await.restore(snapshot);
    }
}

impl std::fmt::Debug for BankingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankingEngine")
            .field("config", &self.config)
            .field("treasury", &self.treasury)
            .field("oracle", &self.oracle)
            .finish()
    }
}

fn require_positive(amount: Wei, what: &str) -> Result<()> {
    if amount.is_zero() {
        return Err(BankError::InvalidAmount {
            message: format!("{} must be greater than zero", what),
        });
    }
    Ok(())
}

fn log_interest(account: &AccountId, realized: Wei) {
    if !realized.is_zero() {
        debug!(account = %account, interest = %realized, "Realized pending interest");
    }
}
