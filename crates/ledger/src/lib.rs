//! Borrow/return ledger (append-only) and the aggregations derived from it.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod entry;
pub mod period;
pub mod report;

pub use entry::{EntryKind, LedgerEntry, NewLedgerEntry};
pub use period::{DateRange, PeriodError, ReportPeriod, parse_instant, parse_optional_instant};
pub use report::{AccountReport, book_income, currently_borrowed_by, open_borrows};
