//! Borrow/return transaction engine.
//!
//! Each command reads the book and the account, checks every precondition,
//! stages the writes through the registries and hands them to the store as
//! one `Transition`. Nothing is written unless every check passed, and the
//! store applies the whole transition or none of it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bookledger_catalog::BookStatus;
use bookledger_core::{AccountId, BookId, Money};
use bookledger_ledger::{LedgerEntry, NewLedgerEntry};

use crate::error::{ErrorKind, LibraryError, LibraryResult};
use crate::registry::{AccountRegistry, BookRegistry};
use crate::store::{LibraryStore, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub account_id: AccountId,
    pub book_id: BookId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBook {
    pub account_id: AccountId,
    pub book_id: BookId,
    pub occurred_at: DateTime<Utc>,
}

pub struct TransactionEngine<S: ?Sized> {
    store: Arc<S>,
    books: Arc<BookRegistry<S>>,
    accounts: Arc<AccountRegistry<S>>,
    fee: Money,
}

impl<S> TransactionEngine<S>
where
    S: LibraryStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        books: Arc<BookRegistry<S>>,
        accounts: Arc<AccountRegistry<S>>,
        fee: Money,
    ) -> Self {
        Self {
            store,
            books,
            accounts,
            fee,
        }
    }

    /// Available → Borrowed.
    ///
    /// The account must be able to cover the fee, but nothing is charged
    /// until the book comes back.
    #[instrument(skip(self), fields(book_id = %cmd.book_id, account_id = %cmd.account_id))]
    pub async fn borrow(&self, cmd: BorrowBook) -> LibraryResult<LedgerEntry> {
        let result = self.try_borrow(cmd).await;
        log_outcome("borrow", &result);
        result
    }

    /// Borrowed → Available, charging the fee to the requesting account.
    ///
    /// The requester is not required to be the borrower.
    #[instrument(skip(self), fields(book_id = %cmd.book_id, account_id = %cmd.account_id))]
    pub async fn return_book(&self, cmd: ReturnBook) -> LibraryResult<LedgerEntry> {
        let result = self.try_return(cmd).await;
        log_outcome("return", &result);
        result
    }

    async fn try_borrow(&self, cmd: BorrowBook) -> LibraryResult<LedgerEntry> {
        let book = self.books.get(cmd.book_id).await?;
        let account = self.accounts.get(cmd.account_id).await?;

        let book_write = self.books.set_status(&book, BookStatus::Borrowed)?;
        if !account.can_afford(self.fee) {
            return Err(LibraryError::InsufficientBalance(cmd.account_id));
        }

        let transition = Transition {
            book: book_write,
            balance: None,
            entry: NewLedgerEntry::borrow(cmd.account_id, cmd.book_id, cmd.occurred_at),
        };
        Ok(self.store.commit(transition).await?)
    }

    async fn try_return(&self, cmd: ReturnBook) -> LibraryResult<LedgerEntry> {
        let book = self.books.get(cmd.book_id).await?;
        let account = self.accounts.get(cmd.account_id).await?;

        let book_write = self.books.set_status(&book, BookStatus::Available)?;
        let balance_write = self
            .accounts
            .adjust_balance(&account, self.fee.negate())
            .map_err(|_| LibraryError::InsufficientBalance(cmd.account_id))?;

        let transition = Transition {
            book: book_write,
            balance: Some(balance_write),
            entry: NewLedgerEntry::return_with_fee(
                cmd.account_id,
                cmd.book_id,
                self.fee,
                cmd.occurred_at,
            )?,
        };
        Ok(self.store.commit(transition).await?)
    }
}

fn log_outcome(op: &'static str, result: &LibraryResult<LedgerEntry>) {
    match result {
        Ok(entry) => tracing::info!(
            op,
            sequence = entry.sequence,
            fee = %entry.fee_amount,
            "ledger transition committed"
        ),
        Err(e) => match e.kind() {
            ErrorKind::Conflict => tracing::warn!(op, error = %e, "ledger transition conflicted"),
            ErrorKind::Internal => tracing::error!(op, error = %e, "ledger transition failed"),
            _ => tracing::debug!(op, code = e.code(), "ledger transition rejected"),
        },
    }
}
