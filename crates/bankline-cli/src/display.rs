//! Terminal output for ledger and loan results

use bankline_core::{TransactionRecord, TransactionType, Wei};
use colored::*;

const RULE_WIDTH: usize = 48;

/// Step or report heading
pub fn heading(title: &str) {
    println!();
    println!("{} {}", "▌".bright_blue(), title.bright_white().bold());
    println!("{}", "─".repeat(RULE_WIDTH).bright_black());
}

/// An operation the engine committed
pub fn committed(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

/// An operation the engine refused or that could not complete
pub fn rejected(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

/// Informational line that is neither a commit nor a rejection
pub fn note(message: &str) {
    println!("  {} {}", "·".bright_blue(), message.dimmed());
}

/// Aligned label / value row
pub fn row(label: &str, value: &str) {
    println!("    {:<20} {}", label, value.bright_cyan());
}

/// Amount row: ether first, exact wei dimmed after it
pub fn wei(label: &str, value: Wei) {
    println!(
        "    {:<20} {} {}",
        label,
        value.to_string().bright_cyan(),
        format!("({} wei)", value.0).dimmed()
    );
}

/// Rate row in basis points with its percentage
pub fn bps(label: &str, bps: u32) {
    row(label, &format_bps(bps));
}

/// One journal entry, numbered from 1
pub fn record(position: usize, record: &TransactionRecord) {
    let kind = record.transaction_type.to_string();
    let kind = match record.transaction_type {
        TransactionType::Deposit
        | TransactionType::InterestCredited
        | TransactionType::LoanApproved => kind.bright_green(),
        TransactionType::Withdrawal | TransactionType::LoanRepaid => kind.bright_yellow(),
        TransactionType::LoanApplied => kind.bright_white(),
    };
    println!(
        "  {:>3}. {:<18} {}",
        position + 1,
        kind,
        record.amount.to_string().bright_cyan()
    );
}

fn format_bps(bps: u32) -> String {
    format!("{} bps ({}.{:02}%)", bps, bps / 100, bps % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bps() {
        assert_eq!(format_bps(100), "100 bps (1.00%)");
        assert_eq!(format_bps(500), "500 bps (5.00%)");
        assert_eq!(format_bps(5), "5 bps (0.05%)");
    }
}
