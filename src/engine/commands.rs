//! Command definitions
//!
//! Commands carry the request layer's already-authenticated intent into the
//! engine. Amounts and currency codes arrive as the caller sent them and are
//! validated by the engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::{DomainError, FraudMetadata, LedgerEntry};

/// Command to credit an account from outside the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCommand {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub fraud: FraudMetadata,
}

impl DepositCommand {
    pub fn new(account_id: Uuid, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            account_id,
            amount,
            currency: currency.into(),
            description: None,
            fraud: FraudMetadata::none(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_fraud(mut self, fraud: FraudMetadata) -> Self {
        self.fraud = fraud;
        self
    }
}

/// Command to debit an account to outside the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawCommand {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub fraud: FraudMetadata,
}

impl WithdrawCommand {
    pub fn new(account_id: Uuid, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            account_id,
            amount,
            currency: currency.into(),
            description: None,
            fraud: FraudMetadata::none(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_fraud(mut self, fraud: FraudMetadata) -> Self {
        self.fraud = fraud;
        self
    }
}

/// How the request layer identified the receiving account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverRef {
    Id(Uuid),
    Email(String),
}

impl ReceiverRef {
    /// Build from the optional request fields; an id takes precedence over an email
    pub fn from_parts(id: Option<Uuid>, email: Option<String>) -> Result<Self, DomainError> {
        match (id, email) {
            (Some(id), _) => Ok(ReceiverRef::Id(id)),
            (None, Some(email)) if !email.trim().is_empty() => {
                Ok(ReceiverRef::Email(email.trim().to_string()))
            }
            _ => Err(DomainError::invalid_input(
                "either receiverId or receiverEmail is required",
            )),
        }
    }
}

impl fmt::Display for ReceiverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverRef::Id(id) => write!(f, "{}", id),
            ReceiverRef::Email(email) => f.write_str(email),
        }
    }
}

/// Command to move money between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub sender_id: Uuid,
    pub receiver: ReceiverRef,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub fraud: FraudMetadata,
}

impl TransferCommand {
    pub fn new(
        sender_id: Uuid,
        receiver: ReceiverRef,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            sender_id,
            receiver,
            amount,
            currency: currency.into(),
            description: None,
            fraud: FraudMetadata::none(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_fraud(mut self, fraud: FraudMetadata) -> Self {
        self.fraud = fraud;
        self
    }
}

/// Outcome of a committed deposit, withdrawal or transfer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResult {
    /// The committed ledger entry
    pub entry: LedgerEntry,
    /// Balance of the acting account's wallet after the commit
    pub new_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_receiver_ref_prefers_id() {
        let id = Uuid::new_v4();
        let r = ReceiverRef::from_parts(Some(id), Some("b@example.com".into())).unwrap();
        assert_eq!(r, ReceiverRef::Id(id));
    }

    #[test]
    fn test_receiver_ref_by_email() {
        let r = ReceiverRef::from_parts(None, Some(" b@example.com ".into())).unwrap();
        assert_eq!(r, ReceiverRef::Email("b@example.com".into()));
        assert_eq!(r.to_string(), "b@example.com");
    }

    #[test]
    fn test_receiver_ref_requires_one_field() {
        assert!(matches!(
            ReceiverRef::from_parts(None, None),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(ReceiverRef::from_parts(None, Some("  ".into())).is_err());
    }

    #[test]
    fn test_command_builders() {
        let cmd = TransferCommand::new(
            Uuid::new_v4(),
            ReceiverRef::Email("b@example.com".into()),
            dec!(25.5),
            "EUR",
        )
        .with_description("rent share");

        assert_eq!(cmd.currency, "EUR");
        assert_eq!(cmd.description.as_deref(), Some("rent share"));
        assert_eq!(cmd.fraud, FraudMetadata::none());
    }
}
