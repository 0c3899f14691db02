//! Account numbers and the capability that mints them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bookledger_core::{DomainError, DomainResult};

/// Public account number, unique across accounts and immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation(
                "account number must be non-empty and alphanumeric",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of candidate account numbers.
///
/// Candidates need not be unique; the account registry checks each one
/// against existing accounts and retries a bounded number of times.
pub trait AccountNumberGenerator: Send + Sync {
    fn generate(&self) -> AccountNumber;
}

impl<G> AccountNumberGenerator for std::sync::Arc<G>
where
    G: AccountNumberGenerator + ?Sized,
{
    fn generate(&self) -> AccountNumber {
        (**self).generate()
    }
}

/// Random lowercase hex tokens (10 characters by default).
#[derive(Debug, Clone, Copy)]
pub struct RandomHexGenerator {
    len: usize,
}

impl RandomHexGenerator {
    /// `len` is clamped to `1..=32` (one v4 UUID worth of hex digits).
    pub fn new(len: usize) -> Self {
        Self {
            len: len.clamp(1, 32),
        }
    }
}

impl Default for RandomHexGenerator {
    fn default() -> Self {
        Self::new(10)
    }
}

impl AccountNumberGenerator for RandomHexGenerator {
    fn generate(&self) -> AccountNumber {
        let hex = Uuid::new_v4().simple().to_string();
        AccountNumber(hex[..self.len].to_string())
    }
}
