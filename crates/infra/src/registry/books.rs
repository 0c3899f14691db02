use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use bookledger_catalog::{Book, BookStatus, StatusError};
use bookledger_core::{AccountId, AggregateRoot, BookId, ExpectedVersion};

use crate::error::{LibraryError, LibraryResult};
use crate::store::{BookWrite, LibraryStore};

pub struct BookRegistry<S: ?Sized> {
    store: Arc<S>,
}

impl<S> BookRegistry<S>
where
    S: LibraryStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Add a book to the catalog. It starts out available.
    #[instrument(skip(self), err)]
    pub async fn register(&self, title: &str, occurred_at: DateTime<Utc>) -> LibraryResult<Book> {
        let book = Book::register(BookId::new(), title, occurred_at)?;
        self.store.insert_book(&book).await?;
        tracing::info!(book_id = %book.id_typed(), "book registered");
        Ok(book)
    }

    pub async fn get(&self, id: BookId) -> LibraryResult<Book> {
        self.store
            .load_book(id)
            .await?
            .ok_or(LibraryError::BookNotFound(id))
    }

    /// Remove a book together with its ledger history.
    #[instrument(skip(self), err)]
    pub async fn remove(&self, id: BookId) -> LibraryResult<()> {
        if !self.store.delete_book(id).await? {
            return Err(LibraryError::BookNotFound(id));
        }
        tracing::info!(book_id = %id, "book removed");
        Ok(())
    }

    /// Books the account holds right now: status Borrowed and the book's
    /// open borrow entry belongs to the account.
    pub async fn find_currently_borrowed_by(&self, account_id: AccountId) -> LibraryResult<Vec<Book>> {
        Ok(self.store.borrowed_by(account_id).await?)
    }

    /// Stage a status change against the version that was read.
    pub(crate) fn set_status(&self, book: &Book, next: BookStatus) -> Result<BookWrite, StatusError> {
        let status = book.transition(next)?;
        Ok(BookWrite {
            book_id: book.id_typed(),
            expected_version: ExpectedVersion::Exact(book.version()),
            status,
        })
    }
}
