//! Append-only transaction journal
//!
//! Each account has its own ordered log. Records are never edited; the only
//! removal path is `truncate`, which the engine uses to discard records
//! staged by an operation that is being reverted.

use std::collections::HashMap;

use bankline_core::{AccountId, TransactionRecord};
use serde::{Deserialize, Serialize};

/// Per-account ordered log of monetary events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionJournal {
    records: HashMap<AccountId, Vec<TransactionRecord>>,
    total: usize,
}

impl TransactionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to an account's log
    pub fn append(&mut self, account: &AccountId, record: TransactionRecord) {
        self.records.entry(account.clone()).or_default().push(record);
        self.total += 1;
    }

    /// All records of an account in insertion order
    pub fn history(&self, account: &AccountId) -> &[TransactionRecord] {
        self.records
            .get(account)
            .map(|records| records.as_slice())
            .unwrap_or(&[])
    }

    /// Number of records in an account's log
    pub fn len(&self, account: &AccountId) -> usize {
        self.records.get(account).map_or(0, |records| records.len())
    }

    /// Number of records across all accounts
    pub fn total_records(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Drop records appended after the log reached `len`
    pub fn truncate(&mut self, account: &AccountId, len: usize) {
        if let Some(records) = self.records.get_mut(account) {
            if records.len() > len {
                self.total -= records.len() - len;
                records.truncate(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankline_core::{TransactionType, Wei};
    use chrono::Utc;

    fn record(kind: TransactionType, amount: u128) -> TransactionRecord {
        TransactionRecord::new(kind, Wei::new(amount), Utc::now())
    }

    #[test]
    fn test_history_keeps_insertion_order() {
        let mut journal = TransactionJournal::new();
        let alice = AccountId::new("0xa11ce");

        journal.append(&alice, record(TransactionType::Deposit, 100));
        journal.append(&alice, record(TransactionType::Withdrawal, 40));

        let kinds: Vec<_> = journal
            .history(&alice)
            .iter()
            .map(|r| r.transaction_type)
            .collect();
        assert_eq!(kinds, vec![TransactionType::Deposit, TransactionType::Withdrawal]);
    }

    #[test]
    fn test_logs_are_per_account() {
        let mut journal = TransactionJournal::new();
        let alice = AccountId::new("0xa11ce");
        let bob = AccountId::new("0xb0b");

        journal.append(&alice, record(TransactionType::Deposit, 100));
        journal.append(&bob, record(TransactionType::Deposit, 7));

        assert_eq!(journal.len(&alice), 1);
        assert_eq!(journal.len(&bob), 1);
        assert_eq!(journal.total_records(), 2);
        assert!(journal.history(&AccountId::new("0xcafe")).is_empty());
    }

    #[test]
    fn test_truncate_discards_only_newer_records() {
        let mut journal = TransactionJournal::new();
        let alice = AccountId::new("0xa11ce");

        journal.append(&alice, record(TransactionType::Deposit, 100));
        let mark = journal.len(&alice);
        journal.append(&alice, record(TransactionType::InterestCredited, 1));
        journal.append(&alice, record(TransactionType::Withdrawal, 50));

        journal.truncate(&alice, mark);
        assert_eq!(journal.len(&alice), 1);
        assert_eq!(journal.total_records(), 1);

        // Truncating to a longer length is a no-op
        journal.truncate(&alice, 10);
        assert_eq!(journal.len(&alice), 1);
    }
}
