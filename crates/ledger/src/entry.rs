use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookledger_core::{AccountId, BookId, DomainError, DomainResult, EntryId, Money};

/// What happened to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Borrow,
    Return,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Borrow => "borrow",
            EntryKind::Return => "return",
        }
    }
}

impl core::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EntryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrow" => Ok(EntryKind::Borrow),
            "return" => Ok(EntryKind::Return),
            other => Err(DomainError::validation(format!("unknown entry kind '{other}'"))),
        }
    }
}

/// A ledger entry ready to be appended (not yet assigned a sequence number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub book_id: BookId,
    pub kind: EntryKind,
    pub fee_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    /// Borrow entries never carry a fee; the fee is charged on return.
    pub fn borrow(account_id: AccountId, book_id: BookId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new(),
            account_id,
            book_id,
            kind: EntryKind::Borrow,
            fee_amount: Money::ZERO,
            created_at,
        }
    }

    pub fn return_with_fee(
        account_id: AccountId,
        book_id: BookId,
        fee: Money,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if fee.is_negative() {
            return Err(DomainError::validation("fee_amount cannot be negative"));
        }
        Ok(Self {
            id: EntryId::new(),
            account_id,
            book_id,
            kind: EntryKind::Return,
            fee_amount: fee,
            created_at,
        })
    }

    /// Stamp the store-assigned sequence number.
    pub fn into_stored(self, sequence: u64) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            sequence,
            account_id: self.account_id,
            book_id: self.book_id,
            kind: self.kind,
            fee_amount: self.fee_amount,
            created_at: self.created_at,
        }
    }
}

/// A stored, immutable ledger entry.
///
/// `sequence` is strictly increasing across the whole ledger and defines
/// "later": ordering never relies on `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub sequence: u64,
    pub account_id: AccountId,
    pub book_id: BookId,
    pub kind: EntryKind,
    pub fee_amount: Money,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrow_entries_are_free() {
        let e = NewLedgerEntry::borrow(AccountId::new(), BookId::new(), Utc::now());
        assert_eq!(e.kind, EntryKind::Borrow);
        assert_eq!(e.fee_amount, Money::ZERO);
    }

    #[test]
    fn return_entries_reject_negative_fees() {
        let err = NewLedgerEntry::return_with_fee(
            AccountId::new(),
            BookId::new(),
            Money::from_minor(-1),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EntryKind::Return).unwrap(), "\"return\"");
        assert_eq!("borrow".parse::<EntryKind>().unwrap(), EntryKind::Borrow);
    }
}
