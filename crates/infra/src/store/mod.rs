//! Persistence boundary for books, accounts and the ledger.
//!
//! The `LibraryStore` port makes no storage assumptions: the in-memory
//! adapter backs tests/dev, the Postgres adapter backs production.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLibraryStore;
pub use postgres::PostgresLibraryStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use bookledger_accounts::{Account, AccountNumber};
use bookledger_catalog::{Book, BookStatus};
use bookledger_core::{AccountId, BookId, DomainError, ExpectedVersion, Money};
use bookledger_ledger::{DateRange, EntryKind, LedgerEntry, NewLedgerEntry};

/// Store operation error.
///
/// These are infrastructure outcomes (concurrency, storage) as opposed to
/// business preconditions, which are checked before a commit is attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Stale version, row lock held elsewhere, or a row vanished mid-flight.
    #[error("conflicting concurrent write: {0}")]
    Conflict(String),

    /// The balance write would leave the account below zero.
    #[error("balance of account {0} would become negative")]
    NegativeBalance(AccountId),

    #[error("account number already taken")]
    DuplicateAccountNumber,

    /// The transition's parts do not describe one coherent event.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::InvalidTransition(other.to_string()),
        }
    }
}

/// Staged status change for one book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookWrite {
    pub book_id: BookId,
    pub expected_version: ExpectedVersion,
    pub status: BookStatus,
}

/// Staged balance change for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceWrite {
    pub account_id: AccountId,
    pub expected_version: ExpectedVersion,
    pub delta: Money,
}

/// Everything one borrow or return changes, committed as a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub book: BookWrite,
    pub balance: Option<BalanceWrite>,
    pub entry: NewLedgerEntry,
}

impl Transition {
    /// Reject parts that do not describe one borrow or one return.
    ///
    /// A borrow leaves the book `Borrowed` and moves no money. A return
    /// leaves it `Available` and debits exactly the entry's fee from the
    /// returning account. Every part must name the same book and account.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.entry.book_id != self.book.book_id {
            return Err(invalid("ledger entry and book write target different books"));
        }

        match self.entry.kind {
            EntryKind::Borrow => {
                if self.book.status != BookStatus::Borrowed {
                    return Err(invalid("a borrow must leave the book borrowed"));
                }
                if self.balance.is_some() {
                    return Err(invalid("a borrow must not change any balance"));
                }
                if self.entry.fee_amount != Money::ZERO {
                    return Err(invalid("a borrow entry carries no fee"));
                }
            }
            EntryKind::Return => {
                if self.book.status != BookStatus::Available {
                    return Err(invalid("a return must leave the book available"));
                }
                let Some(balance) = &self.balance else {
                    return Err(invalid("a return must charge its fee"));
                };
                if balance.account_id != self.entry.account_id {
                    return Err(invalid(
                        "ledger entry and balance write target different accounts",
                    ));
                }
                if balance.delta != self.entry.fee_amount.negate() {
                    return Err(StoreError::InvalidTransition(format!(
                        "balance delta {} does not debit the fee {}",
                        balance.delta, self.entry.fee_amount
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> StoreError {
    StoreError::InvalidTransition(msg.to_string())
}

/// Ledger query criteria; every field is optional and they combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub account_id: Option<AccountId>,
    pub book_id: Option<BookId>,
    pub kind: Option<EntryKind>,
    pub range: Option<DateRange>,
}

impl EntryFilter {
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Default::default()
        }
    }

    pub fn for_book(book_id: BookId) -> Self {
        Self {
            book_id: Some(book_id),
            ..Default::default()
        }
    }

    pub fn of_kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn within(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn matches(&self, e: &LedgerEntry) -> bool {
        self.account_id.is_none_or(|id| id == e.account_id)
            && self.book_id.is_none_or(|id| id == e.book_id)
            && self.kind.is_none_or(|k| k == e.kind)
            && self.range.is_none_or(|r| r.contains(e.created_at))
    }
}

/// Books, accounts and the append-only ledger behind one atomic commit.
///
/// Implementations must:
/// - apply every part of a `Transition` or none of it
/// - reject a transition whose expected versions are stale (`Conflict`)
/// - never let an account balance go below zero (`NegativeBalance`)
/// - assign strictly increasing ledger `sequence` numbers per book
/// - fail fast instead of waiting on a row another writer holds
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn insert_book(&self, book: &Book) -> Result<(), StoreError>;

    async fn load_book(&self, id: BookId) -> Result<Option<Book>, StoreError>;

    /// Delete a book and every ledger entry referencing it.
    /// Returns `false` if there was no such book.
    async fn delete_book(&self, id: BookId) -> Result<bool, StoreError>;

    /// Fails with `DuplicateAccountNumber` if the number is taken.
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn account_number_taken(&self, number: &AccountNumber) -> Result<bool, StoreError>;

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Atomically apply a borrow/return and return the stored ledger entry.
    async fn commit(&self, transition: Transition) -> Result<LedgerEntry, StoreError>;

    /// Ledger entries matching `filter`, in sequence order.
    async fn entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Borrowed books whose open borrow belongs to `account_id`.
    async fn borrowed_by(&self, account_id: AccountId) -> Result<Vec<Book>, StoreError>;
}

#[async_trait]
impl<S> LibraryStore for Arc<S>
where
    S: LibraryStore + ?Sized,
{
    async fn insert_book(&self, book: &Book) -> Result<(), StoreError> {
        (**self).insert_book(book).await
    }

    async fn load_book(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        (**self).load_book(id).await
    }

    async fn delete_book(&self, id: BookId) -> Result<bool, StoreError> {
        (**self).delete_book(id).await
    }

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        (**self).insert_account(account).await
    }

    async fn account_number_taken(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        (**self).account_number_taken(number).await
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).load_account(id).await
    }

    async fn commit(&self, transition: Transition) -> Result<LedgerEntry, StoreError> {
        (**self).commit(transition).await
    }

    async fn entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).entries(filter).await
    }

    async fn borrowed_by(&self, account_id: AccountId) -> Result<Vec<Book>, StoreError> {
        (**self).borrowed_by(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book_write(book_id: BookId, status: BookStatus) -> BookWrite {
        BookWrite {
            book_id,
            expected_version: ExpectedVersion::Exact(2),
            status,
        }
    }

    fn debit(account_id: AccountId, minor: i64) -> BalanceWrite {
        BalanceWrite {
            account_id,
            expected_version: ExpectedVersion::Exact(1),
            delta: Money::from_minor(minor),
        }
    }

    fn borrow() -> Transition {
        let (book_id, account_id) = (BookId::new(), AccountId::new());
        Transition {
            book: book_write(book_id, BookStatus::Borrowed),
            balance: None,
            entry: NewLedgerEntry::borrow(account_id, book_id, Utc::now()),
        }
    }

    fn give_back() -> Transition {
        let (book_id, account_id) = (BookId::new(), AccountId::new());
        Transition {
            book: book_write(book_id, BookStatus::Available),
            balance: Some(debit(account_id, -1000)),
            entry: NewLedgerEntry::return_with_fee(
                account_id,
                book_id,
                Money::from_minor(1000),
                Utc::now(),
            )
            .unwrap(),
        }
    }

    fn assert_invalid(t: &Transition) {
        assert!(
            matches!(t.validate(), Err(StoreError::InvalidTransition(_))),
            "{t:?} should be rejected"
        );
    }

    #[test]
    fn well_formed_borrow_and_return_pass() {
        assert_eq!(borrow().validate(), Ok(()));
        assert_eq!(give_back().validate(), Ok(()));
    }

    #[test]
    fn borrow_must_leave_the_book_borrowed() {
        let mut t = borrow();
        t.book.status = BookStatus::Available;
        assert_invalid(&t);
    }

    #[test]
    fn borrow_must_not_touch_the_balance() {
        let mut t = borrow();
        t.balance = Some(debit(t.entry.account_id, 5000));
        assert_invalid(&t);

        let mut t = borrow();
        t.balance = Some(debit(t.entry.account_id, 0));
        assert_invalid(&t);
    }

    #[test]
    fn borrow_entry_must_be_free() {
        let mut t = borrow();
        t.entry.fee_amount = Money::from_minor(1000);
        assert_invalid(&t);
    }

    #[test]
    fn return_must_leave_the_book_available() {
        let mut t = give_back();
        t.book.status = BookStatus::Borrowed;
        assert_invalid(&t);
    }

    #[test]
    fn return_must_charge_the_account() {
        let mut t = give_back();
        t.balance = None;
        assert_invalid(&t);
    }

    #[test]
    fn return_delta_must_equal_the_negated_fee() {
        let mut t = give_back();
        t.balance = Some(debit(t.entry.account_id, -999));
        assert_invalid(&t);

        let mut t = give_back();
        t.balance = Some(debit(t.entry.account_id, 1000));
        assert_invalid(&t);
    }

    #[test]
    fn parts_must_name_the_same_book_and_account() {
        let mut t = borrow();
        t.entry.book_id = BookId::new();
        assert_invalid(&t);

        let mut t = give_back();
        t.balance = Some(debit(AccountId::new(), -1000));
        assert_invalid(&t);
    }

    #[test]
    fn stale_versions_surface_as_conflicts() {
        let err: StoreError = ExpectedVersion::Exact(1)
            .check("book", 3)
            .unwrap_err()
            .into();
        assert_eq!(
            err,
            StoreError::Conflict("book: expected Exact(1), found 3".to_string())
        );
    }
}
