//! End-to-end tests for the banking engine

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use bankline_core::{
    AccountId, EngineConfig, LoanPolicy, LoanStatus, ManualClock, TransactionType, Wei,
};
use bankline_engine::{
    BankError, BankingEngine, FundsTransport, InMemoryCustody, TransferResult,
};
use bankline_oracle::StaticPriceFeed;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal_macros::dec;

struct Harness {
    engine: Arc<BankingEngine>,
    custody: InMemoryCustody,
    feed: StaticPriceFeed,
    clock: ManualClock,
}

fn alice() -> AccountId {
    AccountId::new("0xa11ce")
}

fn bob() -> AccountId {
    AccountId::new("0xb0b")
}

fn harness_with(config: EngineConfig) -> Harness {
    let custody = InMemoryCustody::new();
    let feed = StaticPriceFeed::new(200_000_000_000, 8);
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let engine = BankingEngine::with_clock(
        config,
        Arc::new(feed.clone()),
        Arc::new(custody.clone()),
        Arc::new(clock.clone()),
    )
    .unwrap();

    Harness {
        engine: Arc::new(engine),
        custody,
        feed,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::development())
}

#[tokio::test]
async fn test_deposit_routes_fee_to_admin() {
    let h = harness();
    let admin = h.engine.admin().clone();

    let receipt = h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();

    assert_eq!(receipt.fee, Wei::ether_fraction(1, 100));
    assert_eq!(receipt.net, Wei::ether_fraction(99, 100));
    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(99, 100)
    );
    assert_eq!(h.custody.wallet_balance(&admin), Wei::ether_fraction(1, 100));
    assert_eq!(h.engine.fees_collected(), Wei::ether_fraction(1, 100));
}

#[tokio::test]
async fn test_repeated_deposits_do_not_drift() {
    let h = harness();
    let admin = h.engine.admin().clone();

    for _ in 0..10 {
        h.engine.deposit(&alice(), Wei::new(12_345)).await.unwrap();
    }

    // 1% of 12_345 truncates to 123
    assert_eq!(h.custody.wallet_balance(&admin), Wei::new(1_230));
    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::new(122_220)
    );
}

#[tokio::test]
async fn test_zero_amounts_rejected() {
    let h = harness();

    assert!(matches!(
        h.engine.deposit(&alice(), Wei::zero()).await,
        Err(BankError::InvalidAmount { .. })
    ));
    assert!(matches!(
        h.engine.withdraw(&alice(), Wei::zero()).await,
        Err(BankError::InvalidAmount { .. })
    ));
    assert!(matches!(
        h.engine.apply_for_loan(&alice(), Wei::zero()).await,
        Err(BankError::InvalidAmount { .. })
    ));
    assert!(h.engine.transaction_history(&alice()).await.is_empty());
}

#[tokio::test]
async fn test_over_withdrawal_leaves_balance_unchanged() {
    let h = harness();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();

    let result = h.engine.withdraw(&alice(), Wei::ether(1)).await;

    assert_eq!(
        result,
        Err(BankError::InsufficientBalance {
            available: Wei::ether_fraction(99, 100),
            required: Wei::ether(1),
        })
    );
    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(99, 100)
    );
    assert_eq!(h.custody.wallet_balance(&alice()), Wei::zero());
}

#[tokio::test]
async fn test_loan_collateral_limit() {
    let h = harness();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();

    // Max loan is twice the 0.99 ETH balance
    assert!(h
        .engine
        .apply_for_loan(&alice(), Wei::ether_fraction(198, 100))
        .await
        .is_ok());
    let result = h
        .engine
        .apply_for_loan(&alice(), Wei::ether_fraction(199, 100))
        .await;
    assert!(matches!(
        result,
        Err(BankError::InsufficientCollateral { .. })
    ));
    assert_eq!(h.engine.user_loans(&alice()).await.len(), 1);
}

#[tokio::test]
async fn test_full_lending_scenario() {
    let h = harness();
    let admin = h.engine.admin().clone();

    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(99, 100)
    );

    h.engine
        .withdraw(&alice(), Wei::ether_fraction(495, 1000))
        .await
        .unwrap();
    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(495, 1000)
    );

    let index = h
        .engine
        .apply_for_loan(&alice(), Wei::ether_fraction(1, 2))
        .await
        .unwrap();
    assert_eq!(index, 0);
    assert_eq!(
        h.engine.user_loans(&alice()).await[0].status(),
        LoanStatus::Pending
    );

    let wallet_before = h.custody.wallet_balance(&alice());
    let loan = h.engine.approve_loan(&admin, &alice(), 0).await.unwrap();
    assert_eq!(
        h.custody.wallet_balance(&alice()),
        wallet_before.checked_add(Wei::ether_fraction(1, 2)).unwrap()
    );
    // Disbursement does not touch the ledger balance
    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(495, 1000)
    );

    let due = loan.amount_due().unwrap();
    assert_eq!(
        loan.interest_amount,
        Wei::ether_fraction(1, 2).checked_mul(800 * 30).unwrap().checked_div(10_000 * 365).unwrap()
    );

    let receipt = h.engine.repay_loan(&alice(), 0, due).await.unwrap();
    assert_eq!(receipt.due, due);
    assert_eq!(receipt.refunded, Wei::zero());
    assert_eq!(
        h.engine.user_loans(&alice()).await[0].status(),
        LoanStatus::Repaid
    );

    let kinds: Vec<_> = h
        .engine
        .transaction_history(&alice())
        .await
        .iter()
        .map(|r| r.transaction_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::LoanApplied,
            TransactionType::LoanApproved,
            TransactionType::LoanRepaid,
        ]
    );
}

#[tokio::test]
async fn test_loan_state_machine_errors() {
    let h = harness();
    let admin = h.engine.admin().clone();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether(1))
        .await
        .unwrap();

    assert_eq!(
        h.engine.repay_loan(&alice(), 0, Wei::ether(2)).await,
        Err(BankError::LoanNotApproved { index: 0 })
    );
    assert_eq!(
        h.engine.approve_loan(&admin, &alice(), 3).await,
        Err(BankError::LoanNotFound { index: 3 })
    );

    let loan = h.engine.approve_loan(&admin, &alice(), 0).await.unwrap();
    assert_eq!(
        h.engine.approve_loan(&admin, &alice(), 0).await,
        Err(BankError::AlreadyApproved { index: 0 })
    );

    let due = loan.amount_due().unwrap();
    let short = h
        .engine
        .repay_loan(&alice(), 0, due.checked_sub(Wei::new(1)).unwrap())
        .await;
    assert!(matches!(short, Err(BankError::InsufficientRepayment { .. })));
    assert!(!h.engine.user_loans(&alice()).await[0].repaid);

    // Repaying long after the due date costs the same
    h.clock.advance(Duration::days(120));
    h.engine.repay_loan(&alice(), 0, due).await.unwrap();
    assert_eq!(
        h.engine.repay_loan(&alice(), 0, due).await,
        Err(BankError::AlreadyRepaid { index: 0 })
    );
}

#[tokio::test]
async fn test_only_admin_can_approve() {
    let h = harness();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether(1))
        .await
        .unwrap();

    let result = h.engine.approve_loan(&bob(), &alice(), 0).await;

    assert_eq!(
        result,
        Err(BankError::Unauthorized {
            caller: bob().to_string()
        })
    );
    assert!(!h.engine.user_loans(&alice()).await[0].approved);
    assert_eq!(h.custody.wallet_balance(&alice()), Wei::zero());
}

#[tokio::test]
async fn test_one_year_of_interest() {
    let h = harness();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();

    h.clock.advance(Duration::days(365));

    let expected = Wei::ether_fraction(99, 100).basis_points(500).unwrap();
    assert_eq!(h.engine.calculate_interest(&alice()).await.unwrap(), expected);
    // Reads do not realize interest
    assert_eq!(h.engine.calculate_interest(&alice()).await.unwrap(), expected);
    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(99, 100).checked_add(expected).unwrap()
    );
    assert_eq!(h.engine.transaction_history(&alice()).await.len(), 1);
}

#[tokio::test]
async fn test_interest_realized_on_next_touch() {
    let h = harness();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.clock.advance(Duration::days(365));

    let receipt = h
        .engine
        .withdraw(&alice(), Wei::ether_fraction(1, 100))
        .await
        .unwrap();

    let interest = Wei::ether_fraction(99, 100).basis_points(500).unwrap();
    assert_eq!(receipt.interest_realized, interest);
    assert_eq!(h.engine.calculate_interest(&alice()).await.unwrap(), Wei::zero());

    let kinds: Vec<_> = h
        .engine
        .transaction_history(&alice())
        .await
        .iter()
        .map(|r| r.transaction_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TransactionType::Deposit,
            TransactionType::InterestCredited,
            TransactionType::Withdrawal,
        ]
    );
}

#[tokio::test]
async fn test_history_order_after_deposit_and_withdrawal() {
    let h = harness();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .withdraw(&alice(), Wei::ether_fraction(1, 2))
        .await
        .unwrap();

    let history = h.engine.transaction_history(&alice()).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].transaction_type, TransactionType::Deposit);
    // Deposits are journaled net of the fee
    assert_eq!(history[0].amount, Wei::ether_fraction(99, 100));
    assert_eq!(history[1].transaction_type, TransactionType::Withdrawal);
    assert_eq!(history[1].amount, Wei::ether_fraction(1, 2));
}

#[tokio::test]
async fn test_failed_withdrawal_transfer_reverts_everything() {
    let h = harness();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.clock.advance(Duration::days(30));
    let pending = h.engine.calculate_interest(&alice()).await.unwrap();
    assert!(!pending.is_zero());

    h.custody.fail_transfers_to(&alice());
    let result = h
        .engine
        .withdraw(&alice(), Wei::ether_fraction(1, 2))
        .await;

    assert!(matches!(result, Err(BankError::TransferFailed { .. })));
    // Interest realization is rolled back along with the debit
    assert_eq!(h.engine.calculate_interest(&alice()).await.unwrap(), pending);
    assert_eq!(h.engine.transaction_history(&alice()).await.len(), 1);

    h.custody.clear_failures();
    assert!(h
        .engine
        .withdraw(&alice(), Wei::ether_fraction(1, 2))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_failed_fee_transfer_reverts_deposit() {
    let h = harness();
    let admin = h.engine.admin().clone();
    h.custody.fail_transfers_to(&admin);

    let result = h.engine.deposit(&alice(), Wei::ether(1)).await;

    assert!(matches!(result, Err(BankError::TransferFailed { .. })));
    assert_eq!(h.engine.account_balance(&alice()).await.unwrap(), Wei::zero());
    assert!(h.engine.transaction_history(&alice()).await.is_empty());
    assert_eq!(h.engine.fees_collected(), Wei::zero());
}

#[tokio::test]
async fn test_failed_disbursement_leaves_loan_pending() {
    let h = harness();
    let admin = h.engine.admin().clone();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether(1))
        .await
        .unwrap();

    h.custody.fail_transfers_to(&alice());
    let result = h.engine.approve_loan(&admin, &alice(), 0).await;

    assert!(matches!(result, Err(BankError::TransferFailed { .. })));
    let loans = h.engine.user_loans(&alice()).await;
    assert_eq!(loans[0].status(), LoanStatus::Pending);
    assert_eq!(
        h.engine
            .transaction_history(&alice())
            .await
            .last()
            .unwrap()
            .transaction_type,
        TransactionType::LoanApplied
    );

    h.custody.clear_failures();
    assert!(h.engine.approve_loan(&admin, &alice(), 0).await.is_ok());
}

/// Transport that calls back into the engine when paying `watched`
struct ReentrantTransport {
    inner: InMemoryCustody,
    watched: AccountId,
    engine: OnceLock<Weak<BankingEngine>>,
    observed_balance: Mutex<Option<Wei>>,
    reentrant_result: Mutex<Option<Result<(), BankError>>>,
}

#[async_trait]
impl FundsTransport for ReentrantTransport {
    async fn send(&self, to: &AccountId, amount: Wei) -> TransferResult<()> {
        if to == &self.watched {
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                let balance = engine.account_balance(to).await.ok();
                *self.observed_balance.lock() = balance;

                let result = engine.deposit(to, Wei::ether(1)).await.map(|_| ());
                *self.reentrant_result.lock() = Some(result);
            }
        }
        self.inner.send(to, amount).await
    }
}

#[tokio::test]
async fn test_reentrant_mutation_rejected_and_read_sees_committed_state() {
    let transport = Arc::new(ReentrantTransport {
        inner: InMemoryCustody::new(),
        watched: alice(),
        engine: OnceLock::new(),
        observed_balance: Mutex::new(None),
        reentrant_result: Mutex::new(None),
    });
    let engine = Arc::new(
        BankingEngine::with_clock(
            EngineConfig::development(),
            Arc::new(StaticPriceFeed::new(200_000_000_000, 8)),
            transport.clone(),
            Arc::new(ManualClock::default()),
        )
        .unwrap(),
    );
    transport.engine.set(Arc::downgrade(&engine)).unwrap();

    engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    engine
        .withdraw(&alice(), Wei::ether_fraction(49, 100))
        .await
        .unwrap();

    assert_eq!(
        *transport.observed_balance.lock(),
        Some(Wei::ether_fraction(1, 2))
    );
    assert!(matches!(
        *transport.reentrant_result.lock(),
        Some(Err(BankError::ReentrantCall { .. }))
    ));
    assert_eq!(
        engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(1, 2)
    );
    assert_eq!(transport.inner.wallet_balance(&alice()), Wei::ether_fraction(49, 100));
}

#[tokio::test]
async fn test_oracle_outage_does_not_block_deposits() {
    let h = harness();
    assert_eq!(h.engine.eth_usd_price().await.unwrap(), dec!(2000));

    h.feed.set_outage("feed offline");

    assert!(matches!(
        h.engine.eth_usd_price().await,
        Err(BankError::OracleUnavailable { .. })
    ));
    assert!(h.engine.deposit(&alice(), Wei::ether(1)).await.is_ok());
    assert!(h
        .engine
        .withdraw(&alice(), Wei::ether_fraction(1, 2))
        .await
        .is_ok());
    assert!(matches!(
        h.engine.balance_in_usd(&alice()).await,
        Err(BankError::OracleUnavailable { .. })
    ));

    h.feed.restore();
    assert_eq!(h.engine.balance_in_usd(&alice()).await.unwrap(), dec!(980));
}

#[tokio::test]
async fn test_account_summary() {
    let h = harness();
    let admin = h.engine.admin().clone();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether(1))
        .await
        .unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether_fraction(1, 2))
        .await
        .unwrap();
    let loan = h.engine.approve_loan(&admin, &alice(), 0).await.unwrap();
    h.clock.advance(Duration::days(31));

    let summary = h.engine.account_summary(&alice()).await.unwrap();

    assert_eq!(summary.principal, Wei::ether_fraction(99, 100));
    assert!(!summary.pending_interest.is_zero());
    assert_eq!(
        summary.balance,
        summary.principal.checked_add(summary.pending_interest).unwrap()
    );
    assert_eq!(summary.loan_count, 2);
    assert_eq!(summary.pending_loans, 1);
    assert_eq!(summary.outstanding_debt, loan.amount_due().unwrap());
    assert_eq!(summary.overdue_loans, 1);
    assert_eq!(summary.history_len, 4);
    // Collateral covers half the loan, so capacity is twice the principal
    assert_eq!(summary.borrowing_capacity, Wei::ether_fraction(198, 100));
    assert_eq!(h.engine.total_custody().await.unwrap(), summary.principal);
}

#[tokio::test]
async fn test_refund_overpayment_policy() {
    let h = harness_with(EngineConfig::development().with_loan_policy(LoanPolicy {
        refund_overpayment: true,
        ..LoanPolicy::default()
    }));
    let admin = h.engine.admin().clone();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether(1))
        .await
        .unwrap();
    let loan = h.engine.approve_loan(&admin, &alice(), 0).await.unwrap();
    let due = loan.amount_due().unwrap();

    let receipt = h
        .engine
        .repay_loan(&alice(), 0, due.checked_add(Wei::new(42)).unwrap())
        .await
        .unwrap();

    assert_eq!(receipt.refunded, Wei::new(42));
    assert_eq!(
        h.custody.wallet_balance(&alice()),
        Wei::ether(1).checked_add(Wei::new(42)).unwrap()
    );
}

#[tokio::test]
async fn test_failed_refund_reverts_repayment() {
    let h = harness_with(EngineConfig::development().with_loan_policy(LoanPolicy {
        refund_overpayment: true,
        ..LoanPolicy::default()
    }));
    let admin = h.engine.admin().clone();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether(1))
        .await
        .unwrap();
    let loan = h.engine.approve_loan(&admin, &alice(), 0).await.unwrap();
    let overpayment = loan.amount_due().unwrap().checked_add(Wei::new(42)).unwrap();
    let history_before = h.engine.transaction_history(&alice()).await;

    h.custody.fail_transfers_to(&alice());
    let result = h.engine.repay_loan(&alice(), 0, overpayment).await;

    assert!(matches!(result, Err(BankError::TransferFailed { .. })));
    let loans = h.engine.user_loans(&alice()).await;
    assert_eq!(loans[0].status(), LoanStatus::Approved);
    let history = h.engine.transaction_history(&alice()).await;
    assert_eq!(history, history_before);
    assert_eq!(
        history.last().map(|r| r.transaction_type),
        Some(TransactionType::LoanApproved)
    );
    assert!(history
        .iter()
        .all(|r| r.transaction_type != TransactionType::LoanRepaid));

    h.custody.clear_failures();
    let receipt = h.engine.repay_loan(&alice(), 0, overpayment).await.unwrap();
    assert_eq!(receipt.refunded, Wei::new(42));
    let loans = h.engine.user_loans(&alice()).await;
    assert_eq!(loans[0].status(), LoanStatus::Repaid);
}

#[tokio::test]
async fn test_overpayment_kept_by_default() {
    let h = harness();
    let admin = h.engine.admin().clone();
    h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
    h.engine
        .apply_for_loan(&alice(), Wei::ether(1))
        .await
        .unwrap();
    let loan = h.engine.approve_loan(&admin, &alice(), 0).await.unwrap();
    let paid = loan.amount_due().unwrap().checked_add(Wei::new(42)).unwrap();

    let receipt = h.engine.repay_loan(&alice(), 0, paid).await.unwrap();

    assert_eq!(receipt.refunded, Wei::zero());
    assert_eq!(receipt.excess(), Wei::new(42));
    assert_eq!(h.custody.wallet_balance(&alice()), Wei::ether(1));
}

#[tokio::test]
async fn test_recheck_collateral_policy() {
    let strict = harness_with(EngineConfig::development().with_loan_policy(LoanPolicy {
        recheck_collateral_on_approval: true,
        ..LoanPolicy::default()
    }));
    let lenient = harness();

    for h in [&strict, &lenient] {
        h.engine.deposit(&alice(), Wei::ether(1)).await.unwrap();
        h.engine
            .apply_for_loan(&alice(), Wei::ether_fraction(198, 100))
            .await
            .unwrap();
        h.engine
            .withdraw(&alice(), Wei::ether_fraction(1, 2))
            .await
            .unwrap();
    }

    let admin = strict.engine.admin().clone();
    assert!(matches!(
        strict.engine.approve_loan(&admin, &alice(), 0).await,
        Err(BankError::InsufficientCollateral { .. })
    ));
    assert!(lenient.engine.approve_loan(&admin, &alice(), 0).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_deposits_are_serialized() {
    let h = harness();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.deposit(&alice(), Wei::ether(1)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(
        h.engine.account_balance(&alice()).await.unwrap(),
        Wei::ether_fraction(99, 100).checked_mul(16).unwrap()
    );
    assert_eq!(h.engine.fees_collected(), Wei::ether_fraction(16, 100));
    assert_eq!(h.engine.transaction_history(&alice()).await.len(), 16);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let mut config = EngineConfig::development();
    config.rates.collateral_ratio_bps = 0;

    let result = BankingEngine::new(
        config,
        Arc::new(StaticPriceFeed::new(1, 0)),
        Arc::new(InMemoryCustody::new()),
    );

    assert!(matches!(result, Err(BankError::InvalidConfig { .. })));
}
