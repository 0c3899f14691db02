//! Borrower accounts: identity, account numbers and the non-negative balance.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod number;

pub use account::{Account, BalanceError};
pub use number::{AccountNumber, AccountNumberGenerator, RandomHexGenerator};
