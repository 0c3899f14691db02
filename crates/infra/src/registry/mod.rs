//! Book and account registries.
//!
//! Registries own reads and creation of their rows. Status and balance
//! changes are only staged here (`BookWrite` / `BalanceWrite`); the
//! transaction engine commits them together with a ledger entry.

pub mod accounts;
pub mod books;

pub use accounts::AccountRegistry;
pub use books::BookRegistry;
