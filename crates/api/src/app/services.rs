use std::sync::Arc;

use thiserror::Error;

use bookledger_accounts::RandomHexGenerator;
use bookledger_infra::{InMemoryLibraryStore, Library, LibraryStore, PostgresLibraryStore, StoreError};

use crate::config::ServerConfig;

/// Everything the handlers need, behind one type-erased store.
pub type AppServices = Library<dyn LibraryStore>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to open library store: {0}")]
    Store(#[from] StoreError),
}

pub async fn build_services(config: &ServerConfig) -> Result<AppServices, ServiceError> {
    let store: Arc<dyn LibraryStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresLibraryStore::connect(url).await?;
            tracing::info!("using postgres library store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory library store");
            Arc::new(InMemoryLibraryStore::new())
        }
    };

    Ok(Library::new(
        store,
        &config.ledger,
        Arc::new(RandomHexGenerator::default()),
    ))
}
