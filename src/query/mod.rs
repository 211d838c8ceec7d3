//! Query Service
//!
//! Read-only balance and history lookups. Nothing here mutates accounts or
//! ledger entries.

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Currency, DomainError, LedgerEntry};
use crate::error::AppResult;
use crate::store::WalletStore;

/// Entries returned by a history lookup when the caller does not ask for a size
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Hard cap on a single history page
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn WalletStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Balance of `account_id`'s wallet for `currency`, zero if the wallet was never used
    pub async fn get_balance(&self, account_id: Uuid, currency: Currency) -> AppResult<Decimal> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

        Ok(account.balance(currency))
    }

    /// Entries where the account is sender or receiver, newest first.
    ///
    /// `limit` is clamped to `1..=MAX_HISTORY_LIMIT`. Soft-deleted entries are
    /// excluded.
    pub async fn get_history(&self, account_id: Uuid, limit: usize) -> AppResult<Vec<LedgerEntry>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let entries = self.store.entries_for_account(account_id, limit).await?;

        tracing::debug!(%account_id, limit, returned = entries.len(), "History loaded");
        Ok(entries)
    }
}
