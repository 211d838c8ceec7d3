//! Store Errors

use uuid::Uuid;

/// Errors that can occur in a wallet store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the account changed since it was read
    #[error("Concurrency conflict for account {account_id}: expected version {expected}")]
    Conflict { account_id: Uuid, expected: i64 },

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Ledger entry already exists: {0}")]
    DuplicateEntry(Uuid),

    /// Unit of work rejected before touching storage
    #[error("Invalid unit of work: {0}")]
    InvalidUnit(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Persisted row could not be mapped back to a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Whether the whole operation may be safely retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::Unavailable(_) | StoreError::Database(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let conflict = StoreError::Conflict {
            account_id: Uuid::new_v4(),
            expected: 4,
        };
        assert!(conflict.is_conflict());
        assert!(conflict.is_retryable());

        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(!StoreError::DuplicateEmail("a@b.c".into()).is_retryable());
        assert!(!StoreError::InvalidUnit("empty".into()).is_conflict());
    }
}
