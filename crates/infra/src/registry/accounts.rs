use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use bookledger_accounts::{Account, AccountNumberGenerator, BalanceError};
use bookledger_core::{AccountId, AggregateRoot, ExpectedVersion, Money};

use crate::error::{LibraryError, LibraryResult};
use crate::store::{BalanceWrite, LibraryStore, StoreError};

pub struct AccountRegistry<S: ?Sized> {
    store: Arc<S>,
    generator: Arc<dyn AccountNumberGenerator>,
    max_attempts: u32,
}

impl<S> AccountRegistry<S>
where
    S: LibraryStore + ?Sized,
{
    pub fn new(store: Arc<S>, generator: Arc<dyn AccountNumberGenerator>, max_attempts: u32) -> Self {
        Self {
            store,
            generator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Open an account with a freshly generated, unique account number.
    ///
    /// Candidates that are already taken (or lose an insert race) are
    /// discarded; after `max_attempts` candidates the call gives up with
    /// `GenerationExhausted`.
    #[instrument(skip(self), fields(initial_balance = %initial_balance), err)]
    pub async fn create(
        &self,
        initial_balance: Money,
        occurred_at: DateTime<Utc>,
    ) -> LibraryResult<Account> {
        let balance = Money::non_negative(initial_balance.minor())?;

        for attempt in 1..=self.max_attempts {
            let number = self.generator.generate();
            if self.store.account_number_taken(&number).await? {
                tracing::debug!(attempt, "account number candidate taken");
                continue;
            }

            let account = Account::open(AccountId::new(), number, balance, occurred_at)?;
            match self.store.insert_account(&account).await {
                Ok(()) => {
                    tracing::info!(account_id = %account.id_typed(), "account opened");
                    return Ok(account);
                }
                Err(StoreError::DuplicateAccountNumber) => {
                    tracing::debug!(attempt, "account number claimed concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LibraryError::GenerationExhausted(self.max_attempts))
    }

    pub async fn get(&self, id: AccountId) -> LibraryResult<Account> {
        self.store
            .load_account(id)
            .await?
            .ok_or(LibraryError::AccountNotFound(id))
    }

    /// Stage a balance change against the version that was read.
    ///
    /// Refuses anything that would take the balance below zero, whoever
    /// the caller is.
    pub(crate) fn adjust_balance(
        &self,
        account: &Account,
        delta: Money,
    ) -> Result<BalanceWrite, BalanceError> {
        account.checked_adjust(delta)?;
        Ok(BalanceWrite {
            account_id: account.id_typed(),
            expected_version: ExpectedVersion::Exact(account.version()),
            delta,
        })
    }
}
