//! Store module
//!
//! Account store, ledger store and the atomic unit of work. Backends implement
//! [`WalletStore`]; the engine only ever mutates state through
//! [`WalletStore::commit`], which applies every staged change or none of them.

mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::domain::{Account, Currency, EntryStatus, LedgerEntry};

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Account written by a unit of work, with the version it was read at
#[derive(Debug, Clone)]
pub struct StagedAccount {
    pub account: Account,
    pub expected_version: i64,
}

/// Group of record mutations committed as one indivisible step
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    accounts: Vec<StagedAccount>,
    entries: Vec<LedgerEntry>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the full new state of an account. The commit succeeds only if the
    /// stored version still equals the version this copy was loaded at.
    pub fn with_account(mut self, account: Account) -> Self {
        let expected_version = account.version();
        self.accounts.push(StagedAccount {
            account,
            expected_version,
        });
        self
    }

    pub fn with_entry(mut self, entry: LedgerEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn accounts(&self) -> &[StagedAccount] {
        &self.accounts
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Structural checks every backend runs before writing
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.accounts.is_empty() && self.entries.is_empty() {
            return Err(StoreError::InvalidUnit("nothing to commit".to_string()));
        }

        let mut seen = HashSet::new();
        for staged in &self.accounts {
            if !seen.insert(staged.account.id()) {
                return Err(StoreError::InvalidUnit(format!(
                    "account {} staged twice",
                    staged.account.id()
                )));
            }
        }

        if let Some(entry) = self.entries.iter().find(|e| e.status == EntryStatus::Pending) {
            return Err(StoreError::InvalidUnit(format!(
                "ledger entry {} is still PENDING",
                entry.id
            )));
        }

        Ok(())
    }
}

/// Persistence contract for accounts and ledger entries
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Check storage connectivity
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Register an account (used by the external registration flow and fixtures)
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Atomically apply every staged account write and ledger insert
    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;

    async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError>;

    /// Non-deleted entries where the account is sender or receiver, newest first
    async fn entries_for_account(
        &self,
        account_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Every account, including soft-deleted ones
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Every ledger entry, including soft-deleted ones, newest first
    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Set `is_deleted` and clear `is_active`. Returns false if the account is unknown.
    async fn soft_delete_account(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Set `is_deleted` on an entry. Returns false if the entry is unknown.
    async fn soft_delete_entry(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Zero every account's daily transfer volume, returning how many changed
    async fn reset_daily_transfer_amounts(&self) -> Result<u64, StoreError>;

    /// Non-deleted fraudulent entries, newest first
    async fn flagged_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .list_entries()
            .await?
            .into_iter()
            .filter(|e| e.is_fraudulent && !e.is_deleted)
            .collect())
    }

    /// Sum of balances per currency over non-deleted accounts
    async fn currency_totals(&self) -> Result<BTreeMap<Currency, Decimal>, StoreError> {
        let mut totals = BTreeMap::new();
        for account in self.list_accounts().await? {
            if account.is_deleted() {
                continue;
            }
            for wallet in account.wallets() {
                *totals.entry(wallet.currency()).or_insert(Decimal::ZERO) +=
                    wallet.balance().value();
            }
        }
        Ok(totals)
    }

    /// Completed, non-deleted outbound volume per sender in `currency` (unsorted)
    async fn sender_volumes(&self, currency: Currency) -> Result<Vec<(Uuid, Decimal)>, StoreError> {
        let mut volumes: HashMap<Uuid, Decimal> = HashMap::new();
        for entry in self.list_entries().await? {
            if entry.currency != currency
                || entry.status != EntryStatus::Completed
                || entry.is_deleted
            {
                continue;
            }
            if let Some(sender) = entry.sender {
                *volumes.entry(sender).or_insert(Decimal::ZERO) += entry.amount.value();
            }
        }
        Ok(volumes.into_iter().collect())
    }
}
