//! Read-only aggregations over the ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use bookledger_core::{AccountId, BookId, Money};
use bookledger_ledger::{AccountReport, DateRange, EntryKind, ReportPeriod, book_income};

use crate::error::LibraryResult;
use crate::registry::{AccountRegistry, BookRegistry};
use crate::store::{EntryFilter, LibraryStore};

pub struct ReportAggregator<S: ?Sized> {
    store: Arc<S>,
    books: Arc<BookRegistry<S>>,
    accounts: Arc<AccountRegistry<S>>,
}

impl<S> ReportAggregator<S>
where
    S: LibraryStore + ?Sized,
{
    pub fn new(store: Arc<S>, books: Arc<BookRegistry<S>>, accounts: Arc<AccountRegistry<S>>) -> Self {
        Self {
            store,
            books,
            accounts,
        }
    }

    /// Borrow count and fee spend for the calendar month or year around `now`.
    ///
    /// The account is looked up before the period token is parsed, so an
    /// unknown account wins over a bad token.
    #[instrument(skip(self))]
    pub async fn report_for(
        &self,
        account_id: AccountId,
        period: &str,
        now: DateTime<Utc>,
    ) -> LibraryResult<AccountReport> {
        self.accounts.get(account_id).await?;
        let period: ReportPeriod = period.parse()?;
        let range = period.range_at(now)?;

        let entries = self
            .store
            .entries(&EntryFilter::for_account(account_id).within(range))
            .await?;
        Ok(AccountReport::summarize(period, range, account_id, &entries))
    }

    /// Return fees collected for a book between `start` and `end` (inclusive).
    ///
    /// Each bound defaults independently to the start/end of the day
    /// containing `now`. A start after the end sums to zero.
    #[instrument(skip(self))]
    pub async fn income_for(
        &self,
        book_id: BookId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> LibraryResult<Money> {
        self.books.get(book_id).await?;
        let today = DateRange::day_of(now)?;
        let range = DateRange::new(start.unwrap_or(today.start), end.unwrap_or(today.end));
        if range.is_empty() {
            return Ok(Money::ZERO);
        }

        let entries = self
            .store
            .entries(
                &EntryFilter::for_book(book_id)
                    .of_kind(EntryKind::Return)
                    .within(range),
            )
            .await?;
        Ok(book_income(book_id, range, &entries))
    }
}
