use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookledger_core::{AggregateRoot, BookId, DomainError, DomainResult};

/// Availability of a book. Exactly one of the two at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
}

impl BookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
        }
    }
}

impl core::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for BookStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookStatus::Available),
            "borrowed" => Ok(BookStatus::Borrowed),
            other => Err(DomainError::validation(format!("unknown book status '{other}'"))),
        }
    }
}

/// Rejected status transition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    #[error("book {0} is not available for borrowing")]
    Unavailable(BookId),

    #[error("book {0} is not currently borrowed")]
    NotBorrowed(BookId),
}

/// Non-empty, trimmed book title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookTitle(String);

impl BookTitle {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for BookTitle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate root: Book.
///
/// Status changes only through [`Book::transition`] (decide) followed by
/// [`Book::apply_status`] (commit), and the latter is only called by stores
/// while committing a ledger transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    id: BookId,
    title: BookTitle,
    status: BookStatus,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Book {
    /// A newly registered book: available, version 1.
    pub fn register(id: BookId, title: &str, created_at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            title: BookTitle::parse(title)?,
            status: BookStatus::Available,
            version: 1,
            created_at,
        })
    }

    /// Rebuild a book from persisted columns.
    pub fn restore(
        id: BookId,
        title: BookTitle,
        status: BookStatus,
        version: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            status,
            version,
            created_at,
        }
    }

    pub fn id_typed(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &BookTitle {
        &self.title
    }

    pub fn status(&self) -> BookStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Decide whether moving to `next` is legal from the current status.
    ///
    /// Available → Borrowed and Borrowed → Available are the only edges.
    pub fn transition(&self, next: BookStatus) -> Result<BookStatus, StatusError> {
        match (self.status, next) {
            (BookStatus::Available, BookStatus::Borrowed) => Ok(next),
            (BookStatus::Borrowed, BookStatus::Available) => Ok(next),
            (BookStatus::Borrowed, BookStatus::Borrowed) => Err(StatusError::Unavailable(self.id)),
            (BookStatus::Available, BookStatus::Available) => {
                Err(StatusError::NotBorrowed(self.id))
            }
        }
    }

    /// Commit a status and bump the version.
    pub fn apply_status(&mut self, status: BookStatus) {
        self.status = status;
        self.version += 1;
    }
}

impl AggregateRoot for Book {
    type Id = BookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
