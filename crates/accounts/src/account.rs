use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookledger_core::{AccountId, AggregateRoot, DomainResult, Money};

use crate::number::AccountNumber;

/// Rejected balance change.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BalanceError {
    #[error("insufficient funds: balance {balance}, adjustment {delta}")]
    InsufficientFunds { balance: Money, delta: Money },

    #[error("balance overflow")]
    Overflow,
}

/// Aggregate root: borrower Account.
///
/// The balance is never negative. Only ledger transitions change it, through
/// [`Account::checked_adjust`] (decide) and [`Account::apply_adjustment`]
/// (commit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    account_number: AccountNumber,
    balance: Money,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new account; `initial_balance` must be non-negative.
    pub fn open(
        id: AccountId,
        account_number: AccountNumber,
        initial_balance: Money,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let balance = Money::non_negative(initial_balance.minor())?;
        Ok(Self {
            id,
            account_number,
            balance,
            version: 1,
            created_at,
        })
    }

    /// Rebuild an account from persisted columns.
    pub fn restore(
        id: AccountId,
        account_number: AccountNumber,
        balance: Money,
        version: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_number,
            balance,
            version,
            created_at,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn account_number(&self) -> &AccountNumber {
        &self.account_number
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn can_afford(&self, amount: Money) -> bool {
        self.balance >= amount
    }

    /// Balance after applying `delta`, or why it cannot be applied.
    pub fn checked_adjust(&self, delta: Money) -> Result<Money, BalanceError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(BalanceError::Overflow)?;
        if next.is_negative() {
            return Err(BalanceError::InsufficientFunds {
                balance: self.balance,
                delta,
            });
        }
        Ok(next)
    }

    /// Commit a balance adjustment and bump the version.
    pub fn apply_adjustment(&mut self, delta: Money) -> Result<(), BalanceError> {
        self.balance = self.checked_adjust(delta)?;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookledger_core::DomainError;
    use proptest::prelude::*;

    fn account(balance: i64) -> Account {
        Account::open(
            AccountId::new(),
            AccountNumber::parse("abc123").unwrap(),
            Money::from_minor(balance),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn negative_opening_balance_is_rejected() {
        let err = Account::open(
            AccountId::new(),
            AccountNumber::parse("abc123").unwrap(),
            Money::from_minor(-1),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn adjustment_below_zero_is_insufficient_funds() {
        let mut a = account(500);
        let err = a.apply_adjustment(Money::from_minor(-501)).unwrap_err();
        assert_eq!(
            err,
            BalanceError::InsufficientFunds {
                balance: Money::from_minor(500),
                delta: Money::from_minor(-501),
            }
        );
        assert_eq!(a.balance(), Money::from_minor(500));
        assert_eq!(a.version(), 1);
    }

    #[test]
    fn adjustment_to_exactly_zero_is_allowed() {
        let mut a = account(1000);
        a.apply_adjustment(Money::from_minor(-1000)).unwrap();
        assert_eq!(a.balance(), Money::ZERO);
        assert_eq!(a.version(), 2);
    }

    proptest! {
        /// Property: no sequence of adjustments drives the balance negative.
        #[test]
        fn balance_never_negative(
            start in 0i64..10_000,
            deltas in prop::collection::vec(-5_000i64..5_000, 0..50)
        ) {
            let mut a = account(start);
            for d in deltas {
                let _ = a.apply_adjustment(Money::from_minor(d));
                prop_assert!(!a.balance().is_negative());
            }
        }
    }
}
