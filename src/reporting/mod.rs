//! Administrative reporting
//!
//! Read-side aggregation over accounts and ledger entries, plus the two
//! soft-delete actions. Soft deletes only ever flip `is_deleted`/`is_active`;
//! balances and completed entry fields are left alone.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Account, Currency, DomainError, LedgerEntry};
use crate::error::AppResult;
use crate::store::WalletStore;

pub const DEFAULT_REPORT_LIMIT: usize = 10;
pub const MAX_REPORT_LIMIT: usize = 100;

/// One row of the top-accounts-by-balance report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRank {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub currency: Currency,
    pub balance: Decimal,
}

/// One row of the top-senders-by-volume report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRank {
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub total_volume: Decimal,
}

#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn WalletStore>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Non-deleted entries carrying a fraud flag, newest first
    pub async fn flagged_transactions(&self) -> AppResult<Vec<LedgerEntry>> {
        Ok(self.store.flagged_entries().await?)
    }

    /// Sum of balances per currency across non-deleted accounts.
    /// Every supported currency appears, unused ones with zero.
    pub async fn total_balances(&self) -> AppResult<BTreeMap<Currency, Decimal>> {
        let mut totals: BTreeMap<Currency, Decimal> = Currency::ALL
            .into_iter()
            .map(|c| (c, Decimal::ZERO))
            .collect();

        for (currency, sum) in self.store.currency_totals().await? {
            totals.insert(currency, sum);
        }
        Ok(totals)
    }

    pub async fn top_accounts_by_balance(
        &self,
        currency: Currency,
        limit: usize,
    ) -> AppResult<Vec<BalanceRank>> {
        let mut ranks: Vec<BalanceRank> = self
            .store
            .list_accounts()
            .await?
            .into_iter()
            .filter(|a| !a.is_deleted())
            .map(|a| BalanceRank {
                account_id: a.id(),
                balance: a.balance(currency),
                username: a.username().to_string(),
                email: a.email().to_string(),
                currency,
            })
            .collect();

        ranks.sort_by(|x, y| {
            y.balance
                .cmp(&x.balance)
                .then_with(|| x.username.cmp(&y.username))
        });
        ranks.truncate(clamp_limit(limit));
        Ok(ranks)
    }

    /// Senders ranked by completed outbound volume in `currency`. Senders whose
    /// account record no longer exists are skipped.
    pub async fn top_senders_by_volume(
        &self,
        currency: Currency,
        limit: usize,
    ) -> AppResult<Vec<VolumeRank>> {
        let mut volumes = self.store.sender_volumes(currency).await?;
        volumes.sort_by(|x, y| y.1.cmp(&x.1).then_with(|| x.0.cmp(&y.0)));

        let accounts: HashMap<Uuid, Account> = self
            .store
            .list_accounts()
            .await?
            .into_iter()
            .map(|a| (a.id(), a))
            .collect();

        Ok(volumes
            .into_iter()
            .filter_map(|(id, total_volume)| {
                accounts.get(&id).map(|a| VolumeRank {
                    account_id: id,
                    username: a.username().to_string(),
                    email: a.email().to_string(),
                    total_volume,
                })
            })
            .take(clamp_limit(limit))
            .collect())
    }

    pub async fn soft_delete_account(&self, account_id: Uuid) -> AppResult<()> {
        if !self.store.soft_delete_account(account_id).await? {
            return Err(DomainError::AccountNotFound(account_id.to_string()).into());
        }
        tracing::info!(%account_id, "Account soft-deleted");
        Ok(())
    }

    pub async fn soft_delete_entry(&self, entry_id: Uuid) -> AppResult<()> {
        if !self.store.soft_delete_entry(entry_id).await? {
            return Err(DomainError::EntryNotFound(entry_id).into());
        }
        tracing::info!(%entry_id, "Ledger entry soft-deleted");
        Ok(())
    }
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_REPORT_LIMIT)
}
