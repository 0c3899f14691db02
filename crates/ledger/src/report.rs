//! Aggregations over ledger entries.
//!
//! These functions are pure: stores fetch candidate entries, and the rules
//! about which entries count live here so every backend agrees on them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookledger_core::{AccountId, BookId, Money};

use crate::entry::{EntryKind, LedgerEntry};
use crate::period::{DateRange, ReportPeriod};

/// Borrow count and fee spend of one account over one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReport {
    pub period: ReportPeriod,
    #[serde(rename = "start_date")]
    pub start: DateTime<Utc>,
    #[serde(rename = "end_date")]
    pub end: DateTime<Utc>,
    #[serde(rename = "borrowed_books_count")]
    pub borrowed_count: u64,
    pub amount_spent: Money,
}

impl AccountReport {
    /// Count Borrow entries and sum Return fees for `account_id` inside `range`.
    ///
    /// Entries for other accounts or outside the range are ignored.
    pub fn summarize<'a>(
        period: ReportPeriod,
        range: DateRange,
        account_id: AccountId,
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
    ) -> Self {
        let mut borrowed_count = 0u64;
        let mut amount_spent = Money::ZERO;

        for e in entries {
            if e.account_id != account_id || !range.contains(e.created_at) {
                continue;
            }
            match e.kind {
                EntryKind::Borrow => borrowed_count += 1,
                EntryKind::Return => {
                    amount_spent = amount_spent
                        .checked_add(e.fee_amount)
                        .unwrap_or(Money::from_minor(i64::MAX));
                }
            }
        }

        Self {
            period,
            start: range.start,
            end: range.end,
            borrowed_count,
            amount_spent,
        }
    }
}

/// Sum of Return fees collected for `book_id` inside `range`.
pub fn book_income<'a>(
    book_id: BookId,
    range: DateRange,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Money {
    entries
        .into_iter()
        .filter(|e| e.book_id == book_id && e.kind == EntryKind::Return)
        .filter(|e| range.contains(e.created_at))
        .map(|e| e.fee_amount)
        .sum()
}

/// Open borrow per book: the latest Borrow entry with no later Return for
/// the same book.
///
/// "Later" is decided by `sequence`, regardless of input order.
pub fn open_borrows<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> BTreeMap<BookId, &'a LedgerEntry> {
    let mut sorted: Vec<&LedgerEntry> = entries.into_iter().collect();
    sorted.sort_by_key(|e| e.sequence);

    let mut open = BTreeMap::new();
    for e in sorted {
        match e.kind {
            EntryKind::Borrow => {
                open.insert(e.book_id, e);
            }
            EntryKind::Return => {
                open.remove(&e.book_id);
            }
        }
    }
    open
}

/// Books whose open borrow belongs to `account_id`, in book-id order.
pub fn currently_borrowed_by<'a>(
    account_id: AccountId,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Vec<BookId> {
    open_borrows(entries)
        .into_iter()
        .filter(|(_, e)| e.account_id == account_id)
        .map(|(book_id, _)| book_id)
        .collect()
}
