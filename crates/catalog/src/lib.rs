//! Book catalog module.
//!
//! Book identity, title validation and the two-state availability machine.
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod book;

pub use book::{Book, BookStatus, BookTitle, StatusError};
