//! In-memory wallet store
//!
//! Process-local backend used for development and tests. Commits are checked
//! against per-account versions under a single write lock, so conflicting
//! units of work serialise exactly like they do against PostgreSQL.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::domain::{Account, LedgerEntry};

use super::{StoreError, UnitOfWork, WalletStore};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    emails: HashMap<String, Uuid>,
    /// Append-only, in commit order
    entries: Vec<LedgerEntry>,
    entry_ids: HashSet<Uuid>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    failing_commits: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with `StoreError::Unavailable`
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".to_string()))
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.emails.contains_key(account.email()) {
            return Err(StoreError::DuplicateEmail(account.email().to_string()));
        }
        state
            .emails
            .insert(account.email().to_string(), account.id());
        state.accounts.insert(account.id(), account.clone());
        Ok(())
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let state = self.read()?;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        unit.validate()?;

        let mut state = self.write()?;

        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        // Check every precondition before the first write so a rejected unit
        // leaves no trace.
        for staged in unit.accounts() {
            let id = staged.account.id();
            let current = state.accounts.get(&id).ok_or_else(|| {
                StoreError::InvalidUnit(format!("account {} is not registered", id))
            })?;
            if current.version() != staged.expected_version {
                return Err(StoreError::Conflict {
                    account_id: id,
                    expected: staged.expected_version,
                });
            }
        }
        for entry in unit.entries() {
            if state.entry_ids.contains(&entry.id) {
                return Err(StoreError::DuplicateEntry(entry.id));
            }
        }

        for staged in unit.accounts() {
            let mut account = staged.account.clone();
            account.bump_version();
            state.accounts.insert(account.id(), account);
        }
        for entry in unit.entries() {
            state.entry_ids.insert(entry.id);
            state.entries.push(entry.clone());
        }

        Ok(())
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.read()?.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn entries_for_account(
        &self,
        account_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.read()?;
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| !e.is_deleted && e.involves(account_id))
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.read()?.accounts.values().cloned().collect())
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries = self.read()?.entries.clone();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn soft_delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state.accounts.get_mut(&id) {
            Some(account) => {
                account.soft_delete();
                account.bump_version();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_entry(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reset_daily_transfer_amounts(&self) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let mut changed = 0;
        for account in state.accounts.values_mut() {
            if !account.daily_transfer_amount().is_zero() {
                account.reset_daily_transfer_amount();
                account.bump_version();
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Newest first; entries created in the same instant keep reverse commit order
fn sort_newest_first(entries: &mut [LedgerEntry]) {
    entries.reverse();
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
