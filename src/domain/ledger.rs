//! Ledger entries
//!
//! A ledger entry is the append-only record of one money movement. Entries are
//! built in `Pending` state while the engine stages the balance changes and move
//! to a terminal state before they are ever persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Amount, Currency, DomainError};

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "DEPOSIT",
            EntryType::Withdrawal => "WITHDRAWAL",
            EntryType::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(EntryType::Deposit),
            "WITHDRAWAL" => Ok(EntryType::Withdrawal),
            "TRANSFER" => Ok(EntryType::Transfer),
            other => Err(format!("unknown entry type: {}", other)),
        }
    }
}

/// Entry lifecycle: `Pending -> Completed | Failed`, both terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EntryStatus::Pending),
            "COMPLETED" => Ok(EntryStatus::Completed),
            "FAILED" => Ok(EntryStatus::Failed),
            other => Err(format!("unknown entry status: {}", other)),
        }
    }
}

/// Fraud verdict attached by the request layer, stored verbatim
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FraudMetadata(serde_json::Value);

impl FraudMetadata {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn none() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Boolean projection used by reporting.
    ///
    /// Recognises `isFraudulent` / `is_fraudulent` / `flagged` booleans at the
    /// top level of the blob; anything else counts as not fraudulent.
    pub fn is_fraudulent(&self) -> bool {
        ["isFraudulent", "is_fraudulent", "flagged"]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .any(|v| v.as_bool() == Some(true))
    }
}

/// Immutable record of a money movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Amount,
    pub currency: Currency,
    pub sender: Option<Uuid>,
    pub receiver: Option<Uuid>,
    pub status: EntryStatus,
    pub description: String,
    pub metadata: FraudMetadata,
    pub is_fraudulent: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn pending(
        entry_type: EntryType,
        amount: Amount,
        currency: Currency,
        sender: Option<Uuid>,
        receiver: Option<Uuid>,
        description: String,
        metadata: FraudMetadata,
    ) -> Self {
        let is_fraudulent = metadata.is_fraudulent();
        Self {
            id: Uuid::new_v4(),
            entry_type,
            amount,
            currency,
            sender,
            receiver,
            status: EntryStatus::Pending,
            description,
            metadata,
            is_fraudulent,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn deposit(
        receiver: Uuid,
        amount: Amount,
        currency: Currency,
        description: String,
        metadata: FraudMetadata,
    ) -> Self {
        Self::pending(
            EntryType::Deposit,
            amount,
            currency,
            None,
            Some(receiver),
            description,
            metadata,
        )
    }

    pub fn withdrawal(
        sender: Uuid,
        amount: Amount,
        currency: Currency,
        description: String,
        metadata: FraudMetadata,
    ) -> Self {
        Self::pending(
            EntryType::Withdrawal,
            amount,
            currency,
            Some(sender),
            None,
            description,
            metadata,
        )
    }

    pub fn transfer(
        sender: Uuid,
        receiver: Uuid,
        amount: Amount,
        currency: Currency,
        description: String,
        metadata: FraudMetadata,
    ) -> Self {
        Self::pending(
            EntryType::Transfer,
            amount,
            currency,
            Some(sender),
            Some(receiver),
            description,
            metadata,
        )
    }

    /// Move a pending entry to `Completed`
    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition(EntryStatus::Completed)
    }

    /// Move a pending entry to `Failed`
    pub fn fail(&mut self) -> Result<(), DomainError> {
        self.transition(EntryStatus::Failed)
    }

    fn transition(&mut self, next: EntryStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::EntryFinalized {
                id: self.id,
                status: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Whether `account_id` appears on either side of the entry
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.sender == Some(account_id) || self.receiver == Some(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn amount(v: rust_decimal::Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    #[test]
    fn test_entry_sides_follow_type() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let deposit = LedgerEntry::deposit(a, amount(dec!(10)), Currency::Usd, String::new(), FraudMetadata::none());
        assert_eq!(deposit.sender, None);
        assert_eq!(deposit.receiver, Some(a));

        let withdrawal = LedgerEntry::withdrawal(a, amount(dec!(10)), Currency::Usd, String::new(), FraudMetadata::none());
        assert_eq!(withdrawal.sender, Some(a));
        assert_eq!(withdrawal.receiver, None);

        let transfer = LedgerEntry::transfer(a, b, amount(dec!(10)), Currency::Usd, String::new(), FraudMetadata::none());
        assert!(transfer.involves(a));
        assert!(transfer.involves(b));
        assert!(!transfer.involves(Uuid::new_v4()));
    }

    #[test]
    fn test_status_transitions_are_terminal() {
        let mut entry = LedgerEntry::deposit(
            Uuid::new_v4(),
            amount(dec!(5)),
            Currency::Eur,
            "top up".to_string(),
            FraudMetadata::none(),
        );
        assert_eq!(entry.status, EntryStatus::Pending);

        entry.complete().unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);

        assert!(matches!(entry.fail(), Err(DomainError::EntryFinalized { .. })));
        assert!(matches!(entry.complete(), Err(DomainError::EntryFinalized { .. })));
        assert_eq!(entry.status, EntryStatus::Completed);
    }

    #[test]
    fn test_fraud_projection() {
        assert!(FraudMetadata::new(json!({"isFraudulent": true, "score": 0.93})).is_fraudulent());
        assert!(FraudMetadata::new(json!({"flagged": true})).is_fraudulent());
        assert!(!FraudMetadata::new(json!({"isFraudulent": "yes"})).is_fraudulent());
        assert!(!FraudMetadata::none().is_fraudulent());

        let entry = LedgerEntry::withdrawal(
            Uuid::new_v4(),
            amount(dec!(1)),
            Currency::Usd,
            String::new(),
            FraudMetadata::new(json!({"is_fraudulent": true})),
        );
        assert!(entry.is_fraudulent);
    }

    #[test]
    fn test_entry_wire_format() {
        let entry = LedgerEntry::deposit(
            Uuid::new_v4(),
            amount(dec!(1000.00)),
            Currency::Usd,
            "salary".to_string(),
            FraudMetadata::new(json!({"score": 0.1})),
        );
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["type"], "DEPOSIT");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["amount"], "1000.00");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["metadata"]["score"], 0.1);
        assert_eq!(json["isFraudulent"], false);
        assert!(json["sender"].is_null());
    }

    #[test]
    fn test_type_and_status_codes_round_trip() {
        assert_eq!("WITHDRAWAL".parse::<EntryType>().unwrap(), EntryType::Withdrawal);
        assert_eq!("FAILED".parse::<EntryStatus>().unwrap(), EntryStatus::Failed);
        assert!("REFUND".parse::<EntryType>().is_err());
    }
}
