//! PostgreSQL wallet store
//!
//! Accounts carry a `version` column. A unit of work runs inside one database
//! transaction and updates each staged account with `WHERE version = $expected`;
//! a zero row count means another writer got there first and the whole
//! transaction is dropped (rolled back).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{
    Account, Amount, Currency, EntryStatus, EntryType, FraudMetadata, LedgerEntry,
};

use super::{StagedAccount, StoreError, UnitOfWork, WalletStore};

/// SQLSTATE codes mapped to optimistic conflicts
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

type AccountRow = (Uuid, String, String, Decimal, bool, bool, i64, DateTime<Utc>);

type EntryRow = (
    Uuid,
    String,
    Decimal,
    String,
    Option<Uuid>,
    Option<Uuid>,
    String,
    String,
    serde_json::Value,
    bool,
    bool,
    DateTime<Utc>,
);

const ENTRY_COLUMNS: &str = r#"
    id, entry_type, amount, currency, sender_id, receiver_id, status,
    description, metadata, is_fraudulent, is_deleted, created_at
"#;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_wallets(&self, account_id: Uuid) -> Result<Vec<(Currency, Decimal)>, StoreError> {
        let rows: Vec<(String, Decimal)> = sqlx::query_as(
            "SELECT currency, balance FROM wallets WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(code, balance)| Ok((parse_currency(&code)?, balance)))
            .collect()
    }

    async fn hydrate(&self, row: AccountRow) -> Result<Account, StoreError> {
        let (id, email, username, daily, is_active, is_deleted, version, created_at) = row;
        let wallets = self.load_wallets(id).await?;
        Account::from_db_state(
            id, email, username, wallets, daily, is_active, is_deleted, version, created_at,
        )
        .map_err(|e| StoreError::Corrupt(format!("account {}: {}", id, e)))
    }

    async fn write_account(
        tx: &mut Transaction<'_, Postgres>,
        staged: &StagedAccount,
    ) -> Result<(), StoreError> {
        let account = &staged.account;

        let rows_affected = sqlx::query(
            r#"
            UPDATE accounts
            SET daily_transfer_amount = $2,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $3
            "#,
        )
        .bind(account.id())
        .bind(account.daily_transfer_amount())
        .bind(staged.expected_version)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::Conflict {
                account_id: account.id(),
                expected: staged.expected_version,
            });
        }

        for wallet in account.wallets() {
            sqlx::query(
                r#"
                INSERT INTO wallets (account_id, currency, balance)
                VALUES ($1, $2, $3)
                ON CONFLICT (account_id, currency)
                DO UPDATE SET balance = EXCLUDED.balance, updated_at = NOW()
                "#,
            )
            .bind(account.id())
            .bind(wallet.currency().code())
            .bind(wallet.balance().value())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn insert_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, entry_type, amount, currency, sender_id, receiver_id, status,
                description, metadata, is_fraudulent, is_deleted, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id)
        .bind(entry.entry_type.as_str())
        .bind(entry.amount.value())
        .bind(entry.currency.code())
        .bind(entry.sender)
        .bind(entry.receiver)
        .bind(entry.status.as_str())
        .bind(&entry.description)
        .bind(entry.metadata.as_value())
        .bind(entry.is_fraudulent)
        .bind(entry.is_deleted)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match db_code(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => StoreError::DuplicateEntry(entry.id),
            _ => StoreError::Database(e),
        })?;

        Ok(())
    }

    async fn try_commit(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock rows in a stable order so two units touching the same pair of
        // accounts cannot deadlock.
        let mut staged: Vec<&StagedAccount> = unit.accounts().iter().collect();
        staged.sort_by_key(|s| s.account.id());

        for account in staged {
            Self::write_account(&mut tx, account).await?;
        }
        for entry in unit.entries() {
            Self::insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl WalletStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, email, username, daily_transfer_amount,
                is_active, is_deleted, version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id())
        .bind(account.email())
        .bind(account.username())
        .bind(account.daily_transfer_amount())
        .bind(account.is_active())
        .bind(account.is_deleted())
        .bind(account.version())
        .bind(account.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| match db_code(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => StoreError::DuplicateEmail(account.email().to_string()),
            _ => StoreError::Database(e),
        })?;

        for wallet in account.wallets() {
            sqlx::query("INSERT INTO wallets (account_id, currency, balance) VALUES ($1, $2, $3)")
                .bind(account.id())
                .bind(wallet.currency().code())
                .bind(wallet.balance().value())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, email, username, daily_transfer_amount,
                   is_active, is_deleted, version, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, email, username, daily_transfer_amount,
                   is_active, is_deleted, version, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        unit.validate()?;

        match self.try_commit(&unit).await {
            Err(StoreError::Database(e))
                if matches!(
                    db_code(&e).as_deref(),
                    Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
                ) =>
            {
                let account_id = unit
                    .accounts()
                    .first()
                    .map(|s| s.account.id())
                    .unwrap_or_default();
                let expected = unit
                    .accounts()
                    .first()
                    .map(|s| s.expected_version)
                    .unwrap_or_default();
                tracing::debug!(error = %e, "Commit aborted by database, reporting as conflict");
                Err(StoreError::Conflict {
                    account_id,
                    expected,
                })
            }
            other => other,
        }
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError> {
        let sql = format!("SELECT {} FROM ledger_entries WHERE id = $1", ENTRY_COLUMNS);
        let row: Option<EntryRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(entry_from_row).transpose()
    }

    async fn entries_for_account(
        &self,
        account_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE (sender_id = $1 OR receiver_id = $1) AND is_deleted = false
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            ENTRY_COLUMNS
        );
        let rows: Vec<EntryRow> = sqlx::query_as(&sql)
            .bind(account_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows: Vec<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, email, username, daily_transfer_amount,
                   is_active, is_deleted, version, created_at
            FROM accounts
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let wallet_rows: Vec<(Uuid, String, Decimal)> =
            sqlx::query_as("SELECT account_id, currency, balance FROM wallets")
                .fetch_all(&self.pool)
                .await?;

        let mut wallets: BTreeMap<Uuid, Vec<(Currency, Decimal)>> = BTreeMap::new();
        for (account_id, code, balance) in wallet_rows {
            wallets
                .entry(account_id)
                .or_default()
                .push((parse_currency(&code)?, balance));
        }

        rows.into_iter()
            .map(|(id, email, username, daily, is_active, is_deleted, version, created_at)| {
                Account::from_db_state(
                    id,
                    email,
                    username,
                    wallets.remove(&id).unwrap_or_default(),
                    daily,
                    is_active,
                    is_deleted,
                    version,
                    created_at,
                )
                .map_err(|e| StoreError::Corrupt(format!("account {}: {}", id, e)))
            })
            .collect()
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries ORDER BY created_at DESC",
            ENTRY_COLUMNS
        );
        let rows: Vec<EntryRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn soft_delete_account(&self, id: Uuid) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE accounts
            SET is_deleted = true, is_active = false, version = version + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn soft_delete_entry(&self, id: Uuid) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query("UPDATE ledger_entries SET is_deleted = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn reset_daily_transfer_amounts(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET daily_transfer_amount = 0, version = version + 1, updated_at = NOW()
            WHERE daily_transfer_amount <> 0
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn flagged_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE is_fraudulent = true AND is_deleted = false
            ORDER BY created_at DESC
            "#,
            ENTRY_COLUMNS
        );
        let rows: Vec<EntryRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn currency_totals(&self) -> Result<BTreeMap<Currency, Decimal>, StoreError> {
        let rows: Vec<(String, Decimal)> = sqlx::query_as(
            r#"
            SELECT w.currency, COALESCE(SUM(w.balance), 0)
            FROM wallets w
            JOIN accounts a ON a.id = w.account_id
            WHERE a.is_deleted = false
            GROUP BY w.currency
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(code, total)| Ok((parse_currency(&code)?, total)))
            .collect()
    }

    async fn sender_volumes(&self, currency: Currency) -> Result<Vec<(Uuid, Decimal)>, StoreError> {
        let rows: Vec<(Uuid, Decimal)> = sqlx::query_as(
            r#"
            SELECT sender_id, SUM(amount)
            FROM ledger_entries
            WHERE currency = $1
              AND status = 'COMPLETED'
              AND is_deleted = false
              AND sender_id IS NOT NULL
            GROUP BY sender_id
            "#,
        )
        .bind(currency.code())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

fn db_code(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn parse_currency(code: &str) -> Result<Currency, StoreError> {
    code.parse()
        .map_err(|e| StoreError::Corrupt(format!("{}", e)))
}

fn entry_from_row(row: EntryRow) -> Result<LedgerEntry, StoreError> {
    let (
        id,
        entry_type,
        amount,
        currency,
        sender,
        receiver,
        status,
        description,
        metadata,
        is_fraudulent,
        is_deleted,
        created_at,
    ) = row;

    Ok(LedgerEntry {
        id,
        entry_type: entry_type
            .parse::<EntryType>()
            .map_err(StoreError::Corrupt)?,
        amount: Amount::new(amount)
            .map_err(|e| StoreError::Corrupt(format!("entry {}: {}", id, e)))?,
        currency: parse_currency(&currency)?,
        sender,
        receiver,
        status: status.parse::<EntryStatus>().map_err(StoreError::Corrupt)?,
        description,
        metadata: FraudMetadata::new(metadata),
        is_fraudulent,
        is_deleted,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_entry_from_row() {
        let id = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let row: EntryRow = (
            id,
            "WITHDRAWAL".to_string(),
            dec!(42.50),
            "EUR".to_string(),
            Some(sender),
            None,
            "COMPLETED".to_string(),
            "atm".to_string(),
            serde_json::json!({"isFraudulent": false}),
            false,
            false,
            Utc::now(),
        );

        let entry = entry_from_row(row).unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.entry_type, EntryType::Withdrawal);
        assert_eq!(entry.currency, Currency::Eur);
        assert_eq!(entry.amount.value(), dec!(42.50));
        assert_eq!(entry.sender, Some(sender));
    }

    #[test]
    fn test_entry_from_row_rejects_unknown_currency() {
        let row: EntryRow = (
            Uuid::new_v4(),
            "DEPOSIT".to_string(),
            dec!(1),
            "DOGE".to_string(),
            None,
            Some(Uuid::new_v4()),
            "COMPLETED".to_string(),
            String::new(),
            serde_json::Value::Null,
            false,
            false,
            Utc::now(),
        );

        assert!(matches!(entry_from_row(row), Err(StoreError::Corrupt(_))));
    }
}
