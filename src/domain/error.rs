//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::{Currency, EntryStatus};

/// Business rule violations detected before any mutation is attempted.
///
/// Messages echo the caller's amounts and currency codes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Non-positive or out-of-range amount, unknown currency, malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Receiver not found: {0}")]
    ReceiverNotFound(String),

    #[error("Cannot transfer to yourself")]
    SelfTransferNotAllowed,

    #[error("Insufficient funds: requested {requested} {currency}, available {available} {currency}")]
    InsufficientFunds {
        currency: Currency,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Daily transfer limit exceeded: requested {requested} {currency}, already sent {used} of {limit}")]
    DailyLimitExceeded {
        currency: Currency,
        requested: Decimal,
        used: Decimal,
        limit: Decimal,
    },

    #[error("Transaction not found: {0}")]
    EntryNotFound(Uuid),

    /// Ledger entry already reached a terminal status
    #[error("Ledger entry {id} is already {status}")]
    EntryFinalized { id: Uuid, status: EntryStatus },
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn insufficient_funds(currency: Currency, requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            currency,
            requested,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_echoes_input() {
        let err = DomainError::insufficient_funds(Currency::Usd, dec!(150), dec!(100.00));

        assert_eq!(
            err.to_string(),
            "Insufficient funds: requested 150 USD, available 100.00 USD"
        );
    }

    #[test]
    fn test_daily_limit_message() {
        let err = DomainError::DailyLimitExceeded {
            currency: Currency::Gbp,
            requested: dec!(20),
            used: dec!(49990),
            limit: dec!(50000),
        };
        assert_eq!(
            err.to_string(),
            "Daily transfer limit exceeded: requested 20 GBP, already sent 49990 of 50000"
        );
    }

    #[test]
    fn test_entry_finalized_names_status() {
        let err = DomainError::EntryFinalized {
            id: Uuid::nil(),
            status: EntryStatus::Completed,
        };
        assert!(err.to_string().contains("COMPLETED"));
    }
}
