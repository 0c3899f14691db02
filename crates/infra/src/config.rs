//! Ledger configuration (fee, account-number retry bound).

use thiserror::Error;

use bookledger_core::Money;

pub const BORROW_FEE_VAR: &str = "LIBRARY_BORROW_FEE";
pub const ACCOUNT_NUMBER_ATTEMPTS_VAR: &str = "LIBRARY_ACCOUNT_NUMBER_ATTEMPTS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Flat fee charged on every return, in minor units.
    pub borrow_fee: Money,
    /// Candidate account numbers tried before giving up.
    pub account_number_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            borrow_fee: Money::from_minor(1000),
            account_number_attempts: 16,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(BORROW_FEE_VAR) {
            let minor = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= 0)
                .ok_or(ConfigError::Invalid {
                    var: BORROW_FEE_VAR,
                    expected: "a non-negative integer amount in minor units",
                    value: raw.clone(),
                })?;
            cfg.borrow_fee = Money::from_minor(minor);
        }

        if let Some(raw) = get(ACCOUNT_NUMBER_ATTEMPTS_VAR) {
            cfg.account_number_attempts = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v >= 1)
                .ok_or(ConfigError::Invalid {
                    var: ACCOUNT_NUMBER_ATTEMPTS_VAR,
                    expected: "a positive integer",
                    value: raw.clone(),
                })?;
        }

        Ok(cfg)
    }
}
