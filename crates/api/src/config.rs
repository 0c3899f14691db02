//! Server configuration from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use bookledger_infra::{ConfigError as LedgerConfigError, LedgerConfig};

pub const BIND_ADDR_VAR: &str = "LIBRARY_BIND_ADDR";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LIBRARY_BIND_ADDR: invalid socket address '{0}'")]
    BindAddr(String),

    #[error(transparent)]
    Ledger(#[from] LedgerConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub ledger: LedgerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            ledger: LedgerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_addr = get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::BindAddr(raw_addr.clone()))?;

        Ok(Self {
            bind_addr,
            database_url: get(DATABASE_URL_VAR),
            ledger: LedgerConfig::from_lookup(&lookup)?,
        })
    }
}
