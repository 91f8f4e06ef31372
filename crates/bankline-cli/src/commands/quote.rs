//! Rate quotes
//!
//! Pure calculations against the configured rate schedule; no engine is
//! constructed.

use std::str::FromStr;

use anyhow::Context;
use bankline_core::{EngineConfig, Wei, WEI_PER_ETHER};
use bankline_ledger::projected_interest;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::display;

/// Parse an amount given in wei (`1500`) or ether (`1.5eth`)
pub fn parse_wei(input: &str) -> Result<Wei, String> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();

    if let Some(ether) = lower.strip_suffix("eth") {
        let ether = Decimal::from_str(ether.trim())
            .map_err(|e| format!("invalid ether amount '{}': {}", trimmed, e))?;
        if ether.is_sign_negative() {
            return Err(format!("amount '{}' must not be negative", trimmed));
        }
        let wei = ether
            .checked_mul(Decimal::from(WEI_PER_ETHER as u64))
            .and_then(|wei| wei.trunc().to_u128())
            .ok_or_else(|| format!("amount '{}' is out of range", trimmed))?;
        return Ok(Wei(wei));
    }

    trimmed
        .parse::<u128>()
        .map(Wei)
        .map_err(|e| format!("invalid wei amount '{}': {}", trimmed, e))
}

/// Interest a balance earns over `days` at the configured rate
pub fn interest(config: &EngineConfig, balance: Wei, days: u32) -> anyhow::Result<()> {
    let rate = config.rates.interest_rate_bps;
    let interest =
        projected_interest(balance, rate, days).context("interest calculation overflowed")?;
    let total = balance
        .checked_add(interest)
        .context("balance with interest overflowed")?;

    let capacity = config
        .rates
        .max_loan(balance)
        .context("borrowing capacity overflowed")?;

    display::heading("Interest Quote");
    display::wei("Balance", balance);
    display::bps("Annual rate", rate);
    display::row("Days untouched", &days.to_string());
    display::wei("Interest", interest);
    display::wei("Balance after", total);
    display::wei("Borrowing capacity", capacity);

    Ok(())
}

/// Terms of a loan of `amount` under the configured rates
pub fn loan(config: &EngineConfig, amount: Wei) -> anyhow::Result<()> {
    anyhow::ensure!(!amount.is_zero(), "Loan amount must be greater than zero");

    let rates = &config.rates;
    let interest = rates
        .loan_interest(amount)
        .context("loan interest overflowed")?;
    let due = amount
        .checked_add(interest)
        .context("loan amount due overflowed")?;
    let collateral = rates
        .required_collateral(amount)
        .context("collateral calculation overflowed")?;
    let due_date = Utc::now() + rates.loan_term();

    display::heading("Loan Quote");
    display::wei("Principal", amount);
    display::bps("Annual rate", rates.loan_interest_rate_bps);
    display::row("Term", &format!("{} days", rates.loan_term_days));
    display::wei("Interest", interest);
    display::wei("Amount due", due);
    display::row("Due if approved now", &due_date.to_rfc3339());
    display::wei("Required balance", collateral);
    display::bps("Collateral ratio", rates.collateral_ratio_bps);

    Ok(())
}
