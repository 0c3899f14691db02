//! Wiring of registries, engine and reports over one shared store.

use std::sync::Arc;

use serde::Serialize;

use bookledger_accounts::{Account, AccountNumberGenerator};
use bookledger_catalog::Book;
use bookledger_core::AccountId;

use crate::config::LedgerConfig;
use crate::engine::TransactionEngine;
use crate::error::LibraryResult;
use crate::registry::{AccountRegistry, BookRegistry};
use crate::reports::ReportAggregator;
use crate::store::LibraryStore;

/// An account together with the books it currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountOverview {
    pub account: Account,
    pub borrowed_books: Vec<Book>,
}

pub struct Library<S: ?Sized> {
    books: Arc<BookRegistry<S>>,
    accounts: Arc<AccountRegistry<S>>,
    engine: TransactionEngine<S>,
    reports: ReportAggregator<S>,
}

impl<S> Library<S>
where
    S: LibraryStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        config: &LedgerConfig,
        generator: Arc<dyn AccountNumberGenerator>,
    ) -> Self {
        let books = Arc::new(BookRegistry::new(store.clone()));
        let accounts = Arc::new(AccountRegistry::new(
            store.clone(),
            generator,
            config.account_number_attempts,
        ));
        let engine = TransactionEngine::new(
            store.clone(),
            books.clone(),
            accounts.clone(),
            config.borrow_fee,
        );
        let reports = ReportAggregator::new(store, books.clone(), accounts.clone());

        Self {
            books,
            accounts,
            engine,
            reports,
        }
    }

    pub fn books(&self) -> &BookRegistry<S> {
        &self.books
    }

    pub fn accounts(&self) -> &AccountRegistry<S> {
        &self.accounts
    }

    pub fn engine(&self) -> &TransactionEngine<S> {
        &self.engine
    }

    pub fn reports(&self) -> &ReportAggregator<S> {
        &self.reports
    }

    pub async fn account_overview(&self, id: AccountId) -> LibraryResult<AccountOverview> {
        let account = self.accounts.get(id).await?;
        let borrowed_books = self.books.find_currently_borrowed_by(id).await?;
        Ok(AccountOverview {
            account,
            borrowed_books,
        })
    }
}
