//! Infrastructure layer: store adapters, registries, the transaction engine
//! and report aggregation.

pub mod config;
pub mod engine;
pub mod error;
pub mod library;
pub mod registry;
pub mod reports;
pub mod store;

pub use config::{ConfigError, LedgerConfig};
pub use engine::{BorrowBook, ReturnBook, TransactionEngine};
pub use error::{ErrorKind, LibraryError, LibraryResult};
pub use library::{AccountOverview, Library};
pub use registry::{AccountRegistry, BookRegistry};
pub use reports::ReportAggregator;
pub use store::{InMemoryLibraryStore, LibraryStore, PostgresLibraryStore, StoreError};
