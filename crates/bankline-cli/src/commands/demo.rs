//! Demo command - the full lending walkthrough
//!
//! Runs against an in-memory custody, a static price feed and a manual clock,
//! so the interest step can jump a year ahead.

use std::sync::Arc;

use anyhow::Context;
use bankline_core::{AccountId, EngineConfig, ManualClock, Wei};
use bankline_engine::{BankingEngine, InMemoryCustody};
use bankline_oracle::StaticPriceFeed;
use chrono::{Duration, Utc};
use colored::*;

use crate::display;

const DEMO_BORROWER: &str = "0x00000000000000000000000000000000000a11ce";

/// Run the walkthrough: deposit, withdraw, borrow, approve, repay, accrue
pub async fn run_demo(config: EngineConfig, answer: i128, decimals: u8) -> anyhow::Result<()> {
    println!(
        "{}",
        "Bankline Demo: Deposit, Borrow, Repay".bright_white().bold()
    );
    println!();
    println!("  • {} deposit fee routed to the admin", "1%".bright_green());
    println!("  • {} annual interest on balances", "5%".bright_green());
    println!("  • {} collateralized loans", "Admin-approved".bright_green());

    let custody = InMemoryCustody::new();
    let clock = ManualClock::new(Utc::now());
    let engine = BankingEngine::with_clock(
        config,
        Arc::new(StaticPriceFeed::new(answer, decimals)),
        Arc::new(custody.clone()),
        Arc::new(clock.clone()),
    )?;
    let admin = engine.admin().clone();
    let borrower = AccountId::new(DEMO_BORROWER);

    display::heading("Step 1: Deposit 1 ETH");
    let receipt = engine.deposit(&borrower, Wei::ether(1)).await?;
    display::committed("Deposit committed");
    display::wei("Gross", receipt.gross);
    display::wei("Fee", receipt.fee);
    display::wei("Credited", receipt.net);
    display::wei("Admin wallet", custody.wallet_balance(&admin));

    display::heading("Step 2: Withdraw 0.495 ETH");
    let receipt = engine
        .withdraw(&borrower, Wei::ether_fraction(495, 1000))
        .await?;
    display::committed("Withdrawal sent");
    display::wei("Balance", receipt.balance_after);
    display::wei("Borrower wallet", custody.wallet_balance(&borrower));

    display::heading("Step 3: Apply for a 0.5 ETH loan");
    let index = engine
        .apply_for_loan(&borrower, Wei::ether_fraction(1, 2))
        .await?;
    let loan = engine
        .user_loans(&borrower)
        .await
        .get(index)
        .cloned()
        .context("loan missing after application")?;
    display::committed(&format!("Loan #{} recorded", index));
    display::row("Status", &loan.status().to_string());
    display::wei("Interest", loan.interest_amount);
    display::row("Due", &loan.due_timestamp.to_rfc3339());

    display::heading("Step 4: Approve and disburse");
    match engine.approve_loan(&borrower, &borrower, index).await {
        Ok(_) => display::rejected("Borrower approved their own loan"),
        Err(e) => display::note(&format!("Self-approval refused: {}", e)),
    }
    let loan = engine.approve_loan(&admin, &borrower, index).await?;
    display::committed("Admin approved the loan");
    display::wei("Disbursed", loan.amount);
    display::wei("Borrower wallet", custody.wallet_balance(&borrower));

    display::heading("Step 5: Repay");
    let due = loan.amount_due().context("loan amount due overflowed")?;
    let repayment = engine.repay_loan(&borrower, index, due).await?;
    display::committed(&format!("Loan #{} repaid", repayment.index));
    display::wei("Paid", repayment.paid);

    display::heading("Step 6: One year later");
    clock.advance(Duration::days(365));
    let interest = engine.calculate_interest(&borrower).await?;
    display::wei("Pending interest", interest);
    display::wei("Balance", engine.account_balance(&borrower).await?);
    match engine.eth_usd_price().await {
        Ok(price) => {
            display::row("ETH/USD", &price.to_string());
            let usd = engine.balance_in_usd(&borrower).await?;
            display::row("Balance in USD", &usd.round_dp(2).to_string());
        }
        Err(e) => display::rejected(&format!("Price unavailable: {}", e)),
    }

    display::heading("Transaction History");
    for (position, record) in engine
        .transaction_history(&borrower)
        .await
        .iter()
        .enumerate()
    {
        display::record(position, record);
    }

    display::heading("Summary");
    let summary = engine.account_summary(&borrower).await?;
    display::row("Account", summary.account.as_str());
    display::wei("Principal", summary.principal);
    display::wei("Pending interest", summary.pending_interest);
    display::wei("Borrowing capacity", summary.borrowing_capacity);
    display::row("Loans", &summary.loan_count.to_string());
    display::wei("Outstanding debt", summary.outstanding_debt);
    display::wei("Fees collected", engine.fees_collected());
    display::wei("Total custody", engine.total_custody().await?);
    println!();

    Ok(())
}
