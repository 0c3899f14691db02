//! Service-level error for registry, engine and report operations.

use thiserror::Error;

use bookledger_catalog::StatusError;
use bookledger_core::{AccountId, BookId, DomainError};
use bookledger_ledger::PeriodError;

use crate::store::StoreError;

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Coarse failure class; decides retry policy and the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    /// A business precondition did not hold; nothing was written.
    PreconditionFailed,
    /// Concurrent write lost; safe to retry the whole operation.
    Conflict,
    InvalidInput,
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("book {0} not found")]
    BookNotFound(BookId),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("book {0} is not available")]
    BookUnavailable(BookId),

    #[error("book {0} is not borrowed")]
    BookNotBorrowed(BookId),

    #[error("insufficient balance on account {0}")]
    InsufficientBalance(AccountId),

    #[error("concurrent modification, retry the operation: {0}")]
    PersistenceConflict(String),

    #[error("invalid period '{0}': use 'monthly' or 'annual'")]
    InvalidPeriod(String),

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no unique account number after {0} attempts")]
    GenerationExhausted(u32),

    #[error("storage failure: {0}")]
    Store(String),
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::BookNotFound(_) | LibraryError::AccountNotFound(_) => ErrorKind::NotFound,
            LibraryError::BookUnavailable(_)
            | LibraryError::BookNotBorrowed(_)
            | LibraryError::InsufficientBalance(_) => ErrorKind::PreconditionFailed,
            LibraryError::PersistenceConflict(_) => ErrorKind::Conflict,
            LibraryError::InvalidPeriod(_)
            | LibraryError::InvalidDate(_)
            | LibraryError::Validation(_) => ErrorKind::InvalidInput,
            LibraryError::GenerationExhausted(_) | LibraryError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Stable client-facing code.
    pub fn code(&self) -> &'static str {
        match self {
            LibraryError::BookNotFound(_) => "book_not_found",
            LibraryError::AccountNotFound(_) => "account_not_found",
            LibraryError::BookUnavailable(_) => "book_unavailable",
            LibraryError::BookNotBorrowed(_) => "book_not_borrowed",
            LibraryError::InsufficientBalance(_) => "insufficient_balance",
            LibraryError::PersistenceConflict(_) => "persistence_conflict",
            LibraryError::InvalidPeriod(_) => "invalid_period",
            LibraryError::InvalidDate(_) => "invalid_date",
            LibraryError::Validation(_) => "validation_error",
            LibraryError::GenerationExhausted(_) => "account_number_exhausted",
            LibraryError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for LibraryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => LibraryError::PersistenceConflict(msg),
            StoreError::NegativeBalance(id) => LibraryError::InsufficientBalance(id),
            StoreError::DuplicateAccountNumber => {
                LibraryError::PersistenceConflict("account number already taken".to_string())
            }
            StoreError::InvalidTransition(msg) | StoreError::Backend(msg) => {
                LibraryError::Store(msg)
            }
        }
    }
}

impl From<PeriodError> for LibraryError {
    fn from(value: PeriodError) -> Self {
        match value {
            PeriodError::InvalidPeriod(token) => LibraryError::InvalidPeriod(token),
            PeriodError::InvalidDate(raw) => LibraryError::InvalidDate(raw),
            PeriodError::OutOfRange => LibraryError::InvalidDate("out of range".to_string()),
        }
    }
}

impl From<DomainError> for LibraryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                LibraryError::Validation(msg)
            }
            DomainError::Conflict(msg) => LibraryError::PersistenceConflict(msg),
        }
    }
}

impl From<StatusError> for LibraryError {
    fn from(value: StatusError) -> Self {
        match value {
            StatusError::Unavailable(id) => LibraryError::BookUnavailable(id),
            StatusError::NotBorrowed(id) => LibraryError::BookNotBorrowed(id),
        }
    }
}
