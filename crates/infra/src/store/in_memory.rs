use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use bookledger_accounts::{Account, AccountNumber};
use bookledger_catalog::{Book, BookStatus};
use bookledger_core::{AccountId, AggregateRoot, BookId};
use bookledger_ledger::{LedgerEntry, currently_borrowed_by};

use super::{EntryFilter, LibraryStore, StoreError, Transition};

#[derive(Debug, Default)]
struct Tables {
    books: HashMap<BookId, Book>,
    accounts: HashMap<AccountId, Account>,
    entries: Vec<LedgerEntry>,
    last_sequence: u64,
}

/// In-memory library store.
///
/// Intended for tests/dev. One lock guards all tables; a commit validates
/// every part of the transition before it mutates anything, so readers
/// never observe half of a transition.
///
/// Operations on different books or accounts still queue behind that one
/// lock. Only [`PostgresLibraryStore`](super::PostgresLibraryStore) lets
/// writers on unrelated rows proceed independently.
#[derive(Debug, Default)]
pub struct InMemoryLibraryStore {
    tables: RwLock<Tables>,
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl LibraryStore for InMemoryLibraryStore {
    async fn insert_book(&self, book: &Book) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if t.books.contains_key(&book.id_typed()) {
            return Err(StoreError::Conflict(format!(
                "book {} already exists",
                book.id_typed()
            )));
        }
        t.books.insert(book.id_typed(), book.clone());
        Ok(())
    }

    async fn load_book(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.read()?.books.get(&id).cloned())
    }

    async fn delete_book(&self, id: BookId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        if t.books.remove(&id).is_none() {
            return Ok(false);
        }
        t.entries.retain(|e| e.book_id != id);
        Ok(true)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if t
            .accounts
            .values()
            .any(|a| a.account_number() == account.account_number())
        {
            return Err(StoreError::DuplicateAccountNumber);
        }
        if t.accounts.contains_key(&account.id_typed()) {
            return Err(StoreError::Conflict(format!(
                "account {} already exists",
                account.id_typed()
            )));
        }
        t.accounts.insert(account.id_typed(), account.clone());
        Ok(())
    }

    async fn account_number_taken(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .any(|a| a.account_number() == number))
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    async fn commit(&self, transition: Transition) -> Result<LedgerEntry, StoreError> {
        transition.validate()?;
        let Transition {
            book: book_write,
            balance,
            entry,
        } = transition;

        let mut t = self.write()?;

        // 1) Validate every part against current state (no mutation yet).
        let book = t.books.get(&book_write.book_id).ok_or_else(|| {
            StoreError::Conflict(format!("book {} no longer exists", book_write.book_id))
        })?;
        book_write
            .expected_version
            .check(&format!("book {}", book_write.book_id), book.version())?;

        let account = t.accounts.get(&entry.account_id).ok_or_else(|| {
            StoreError::Conflict(format!("account {} no longer exists", entry.account_id))
        })?;
        if let Some(bw) = &balance {
            bw.expected_version
                .check(&format!("account {}", bw.account_id), account.version())?;
            account
                .checked_adjust(bw.delta)
                .map_err(|_| StoreError::NegativeBalance(bw.account_id))?;
        }

        // 2) Apply all parts.
        if let Some(bw) = &balance {
            if let Some(account) = t.accounts.get_mut(&bw.account_id) {
                account
                    .apply_adjustment(bw.delta)
                    .map_err(|_| StoreError::NegativeBalance(bw.account_id))?;
            }
        }
        if let Some(book) = t.books.get_mut(&book_write.book_id) {
            book.apply_status(book_write.status);
        }
        t.last_sequence += 1;
        let stored = entry.into_stored(t.last_sequence);
        t.entries.push(stored.clone());

        Ok(stored)
    }

    async fn entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn borrowed_by(&self, account_id: AccountId) -> Result<Vec<Book>, StoreError> {
        let t = self.read()?;
        Ok(currently_borrowed_by(account_id, &t.entries)
            .into_iter()
            .filter_map(|id| t.books.get(&id))
            .filter(|b| b.status() == BookStatus::Borrowed)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BalanceWrite, BookWrite};
    use bookledger_core::{ExpectedVersion, Money};
    use bookledger_ledger::{EntryKind, NewLedgerEntry};
    use chrono::Utc;

    async fn seeded() -> (InMemoryLibraryStore, Book, Account) {
        let store = InMemoryLibraryStore::new();
        let book = Book::register(BookId::new(), "Dune", Utc::now()).unwrap();
        let account = Account::open(
            AccountId::new(),
            AccountNumber::parse("a1b2c3d4e5").unwrap(),
            Money::from_minor(1500),
            Utc::now(),
        )
        .unwrap();
        store.insert_book(&book).await.unwrap();
        store.insert_account(&account).await.unwrap();
        (store, book, account)
    }

    fn borrow(book: &Book, account: &Account) -> Transition {
        Transition {
            book: BookWrite {
                book_id: book.id_typed(),
                expected_version: ExpectedVersion::Exact(book.version()),
                status: BookStatus::Borrowed,
            },
            balance: None,
            entry: NewLedgerEntry::borrow(account.id_typed(), book.id_typed(), Utc::now()),
        }
    }

    #[tokio::test]
    async fn commit_flips_status_and_appends_entry() {
        let (store, book, account) = seeded().await;
        let stored = store.commit(borrow(&book, &account)).await.unwrap();

        assert_eq!(stored.sequence, 1);
        assert_eq!(stored.kind, EntryKind::Borrow);
        let reloaded = store.load_book(book.id_typed()).await.unwrap().unwrap();
        assert_eq!(reloaded.status(), BookStatus::Borrowed);
        assert_eq!(reloaded.version(), 2);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict_and_changes_nothing() {
        let (store, book, account) = seeded().await;
        store.commit(borrow(&book, &account)).await.unwrap();

        let err = store.commit(borrow(&book, &account)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.entries(&EntryFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn negative_balance_rolls_back_the_whole_transition() {
        let (store, book, account) = seeded().await;
        store.commit(borrow(&book, &account)).await.unwrap();
        let borrowed = store.load_book(book.id_typed()).await.unwrap().unwrap();

        let ret = Transition {
            book: BookWrite {
                book_id: borrowed.id_typed(),
                expected_version: ExpectedVersion::Exact(borrowed.version()),
                status: BookStatus::Available,
            },
            balance: Some(BalanceWrite {
                account_id: account.id_typed(),
                expected_version: ExpectedVersion::Exact(account.version()),
                delta: Money::from_minor(-2000),
            }),
            entry: NewLedgerEntry::return_with_fee(
                account.id_typed(),
                book.id_typed(),
                Money::from_minor(2000),
                Utc::now(),
            )
            .unwrap(),
        };

        let err = store.commit(ret).await.unwrap_err();
        assert_eq!(err, StoreError::NegativeBalance(account.id_typed()));

        let after = store.load_book(book.id_typed()).await.unwrap().unwrap();
        assert_eq!(after.status(), BookStatus::Borrowed);
        let acct = store.load_account(account.id_typed()).await.unwrap().unwrap();
        assert_eq!(acct.balance(), Money::from_minor(1500));
        assert_eq!(store.entries(&EntryFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mismatched_parts_are_rejected() {
        let (store, book, account) = seeded().await;
        let mut t = borrow(&book, &account);
        t.entry.book_id = BookId::new();
        assert!(matches!(
            store.commit(t).await,
            Err(StoreError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn borrow_that_credits_the_account_is_rejected() {
        let (store, book, account) = seeded().await;
        let mut t = borrow(&book, &account);
        t.book.status = BookStatus::Available;
        t.balance = Some(BalanceWrite {
            account_id: account.id_typed(),
            expected_version: ExpectedVersion::Exact(account.version()),
            delta: Money::from_minor(5000),
        });

        assert!(matches!(
            store.commit(t).await,
            Err(StoreError::InvalidTransition(_))
        ));
        let acct = store.load_account(account.id_typed()).await.unwrap().unwrap();
        assert_eq!(acct.balance(), Money::from_minor(1500));
        assert_eq!(acct.version(), 1);
        let reloaded = store.load_book(book.id_typed()).await.unwrap().unwrap();
        assert_eq!(reloaded.version(), 1);
        assert!(store.entries(&EntryFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_account_numbers_are_rejected() {
        let (store, _book, account) = seeded().await;
        let twin = Account::open(
            AccountId::new(),
            account.account_number().clone(),
            Money::ZERO,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(
            store.insert_account(&twin).await,
            Err(StoreError::DuplicateAccountNumber)
        );
        assert!(store.account_number_taken(account.account_number()).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_book_cascades_to_its_entries() {
        let (store, book, account) = seeded().await;
        store.commit(borrow(&book, &account)).await.unwrap();

        assert!(store.delete_book(book.id_typed()).await.unwrap());
        assert!(store.load_book(book.id_typed()).await.unwrap().is_none());
        assert!(store.entries(&EntryFilter::default()).await.unwrap().is_empty());
        assert!(!store.delete_book(book.id_typed()).await.unwrap());
    }

    #[tokio::test]
    async fn borrowed_by_follows_the_open_borrow() {
        let (store, book, account) = seeded().await;
        assert!(store.borrowed_by(account.id_typed()).await.unwrap().is_empty());

        store.commit(borrow(&book, &account)).await.unwrap();
        let books = store.borrowed_by(account.id_typed()).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id_typed(), book.id_typed());
        assert!(store.borrowed_by(AccountId::new()).await.unwrap().is_empty());
    }
}
