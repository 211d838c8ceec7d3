//! Transfer Engine
//!
//! Deposits, withdrawals and transfers. Each operation validates the request,
//! stages every balance change on private copies of the accounts, then hands
//! the accounts and the ledger entry to the store as one unit of work. A
//! version conflict means another operation touched one of the accounts first;
//! the whole operation is then re-read and re-validated from scratch.

use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::LedgerLimits;
use crate::domain::{Account, Amount, Currency, DomainError, LedgerEntry, OperationContext};
use crate::error::{AppError, AppResult};
use crate::store::{UnitOfWork, WalletStore};

use super::mutator::apply_delta;
use super::{DepositCommand, MovementResult, ReceiverRef, TransferCommand, WithdrawCommand};

/// Base delay between conflict retries, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn WalletStore>,
    limits: LedgerLimits,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn WalletStore>, limits: LedgerLimits) -> Self {
        Self { store, limits }
    }

    // =========================================================================
    // Deposit
    // =========================================================================

    pub async fn deposit(
        &self,
        command: DepositCommand,
        context: &OperationContext,
    ) -> AppResult<MovementResult> {
        let result: AppResult<MovementResult> = async {
            let (amount, currency) = self.validate_input(command.amount, &command.currency)?;
            self.with_retries("deposit", || self.try_deposit(&command, amount, currency))
                .await
        }
        .await;

        self.log_outcome("deposit", command.account_id, &result, context);
        result
    }

    async fn try_deposit(
        &self,
        command: &DepositCommand,
        amount: Amount,
        currency: Currency,
    ) -> AppResult<MovementResult> {
        let mut account = self.load_participant(command.account_id).await?;

        let new_balance = apply_delta(&mut account, currency, amount.value())?;

        let mut entry = LedgerEntry::deposit(
            account.id(),
            amount,
            currency,
            command.description.clone().unwrap_or_default(),
            command.fraud.clone(),
        );
        entry.complete()?;

        self.store
            .commit(
                UnitOfWork::new()
                    .with_account(account)
                    .with_entry(entry.clone()),
            )
            .await?;

        Ok(MovementResult {
            entry,
            new_balance: new_balance.value(),
        })
    }

    // =========================================================================
    // Withdraw
    // =========================================================================

    pub async fn withdraw(
        &self,
        command: WithdrawCommand,
        context: &OperationContext,
    ) -> AppResult<MovementResult> {
        let result: AppResult<MovementResult> = async {
            let (amount, currency) = self.validate_input(command.amount, &command.currency)?;
            self.with_retries("withdraw", || self.try_withdraw(&command, amount, currency))
                .await
        }
        .await;

        self.log_outcome("withdraw", command.account_id, &result, context);
        result
    }

    async fn try_withdraw(
        &self,
        command: &WithdrawCommand,
        amount: Amount,
        currency: Currency,
    ) -> AppResult<MovementResult> {
        let mut account = self.load_participant(command.account_id).await?;

        let new_balance = apply_delta(&mut account, currency, -amount.value())?;

        let mut entry = LedgerEntry::withdrawal(
            account.id(),
            amount,
            currency,
            command.description.clone().unwrap_or_default(),
            command.fraud.clone(),
        );
        entry.complete()?;

        self.store
            .commit(
                UnitOfWork::new()
                    .with_account(account)
                    .with_entry(entry.clone()),
            )
            .await?;

        Ok(MovementResult {
            entry,
            new_balance: new_balance.value(),
        })
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    pub async fn transfer(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> AppResult<MovementResult> {
        let result: AppResult<MovementResult> = async {
            let (amount, currency) = self.validate_input(command.amount, &command.currency)?;
            if command.receiver == ReceiverRef::Id(command.sender_id) {
                return Err(DomainError::SelfTransferNotAllowed.into());
            }
            self.with_retries("transfer", || self.try_transfer(&command, amount, currency))
                .await
        }
        .await;

        self.log_outcome("transfer", command.sender_id, &result, context);
        result
    }

    async fn try_transfer(
        &self,
        command: &TransferCommand,
        amount: Amount,
        currency: Currency,
    ) -> AppResult<MovementResult> {
        let mut sender = self.load_participant(command.sender_id).await?;
        let mut receiver = self.resolve_receiver(&command.receiver).await?;

        if sender.id() == receiver.id() {
            return Err(DomainError::SelfTransferNotAllowed.into());
        }

        let new_balance = apply_delta(&mut sender, currency, -amount.value())?;
        self.check_daily_limit(&sender, &amount, currency)?;
        sender.record_outbound(&amount);

        apply_delta(&mut receiver, currency, amount.value())?;

        let mut entry = LedgerEntry::transfer(
            sender.id(),
            receiver.id(),
            amount,
            currency,
            command.description.clone().unwrap_or_default(),
            command.fraud.clone(),
        );
        entry.complete()?;

        self.store
            .commit(
                UnitOfWork::new()
                    .with_account(sender)
                    .with_account(receiver)
                    .with_entry(entry.clone()),
            )
            .await?;

        Ok(MovementResult {
            entry,
            new_balance: new_balance.value(),
        })
    }

    // =========================================================================
    // Validation helpers
    // =========================================================================

    fn validate_input(&self, amount: Decimal, currency: &str) -> Result<(Amount, Currency), DomainError> {
        let currency: Currency = currency
            .parse()
            .map_err(|e: crate::domain::CurrencyError| DomainError::invalid_input(e.to_string()))?;

        let amount = Amount::new(amount)
            .map_err(|e| DomainError::invalid_input(format!("amount {}: {}", amount, e)))?;

        let value = amount.value();
        if value < self.limits.min_transaction_amount || value > self.limits.max_transaction_amount {
            return Err(DomainError::invalid_input(format!(
                "amount {} {} is outside the allowed range {} to {}",
                value,
                currency,
                self.limits.min_transaction_amount,
                self.limits.max_transaction_amount
            )));
        }

        Ok((amount, currency))
    }

    fn check_daily_limit(
        &self,
        sender: &Account,
        amount: &Amount,
        currency: Currency,
    ) -> Result<(), DomainError> {
        let used = sender.daily_transfer_amount();
        if used + amount.value() > self.limits.daily_transfer_limit {
            return Err(DomainError::DailyLimitExceeded {
                currency,
                requested: amount.value(),
                used,
                limit: self.limits.daily_transfer_limit,
            });
        }
        Ok(())
    }

    /// Load an account acting in an operation; deleted accounts do not exist here
    async fn load_participant(&self, account_id: Uuid) -> AppResult<Account> {
        self.store
            .find_account(account_id)
            .await?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()).into())
    }

    async fn resolve_receiver(&self, receiver: &ReceiverRef) -> AppResult<Account> {
        let found = match receiver {
            ReceiverRef::Id(id) => self.store.find_account(*id).await?,
            ReceiverRef::Email(email) => self.store.find_account_by_email(email).await?,
        };

        found
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| DomainError::ReceiverNotFound(receiver.to_string()).into())
    }

    // =========================================================================
    // Retry and logging
    // =========================================================================

    /// Re-run `attempt` while the store reports a version conflict
    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let max_attempts = self.limits.commit_retries.max(1);
        let mut n = 1;

        loop {
            match attempt().await {
                Err(AppError::Persistence(e)) if e.is_conflict() && n < max_attempts => {
                    tracing::debug!(
                        operation,
                        attempt = n,
                        max_attempts,
                        error = %e,
                        "Version conflict, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * n).await;
                    n += 1;
                }
                other => return other,
            }
        }
    }

    fn log_outcome(
        &self,
        operation: &'static str,
        account_id: Uuid,
        result: &AppResult<MovementResult>,
        context: &OperationContext,
    ) {
        match result {
            Ok(done) => tracing::info!(
                operation,
                %account_id,
                entry_id = %done.entry.id,
                amount = %done.entry.amount,
                currency = %done.entry.currency,
                new_balance = %done.new_balance,
                fraudulent = done.entry.is_fraudulent,
                correlation_id = ?context.correlation_id,
                "Ledger operation committed"
            ),
            Err(AppError::Domain(e)) => tracing::warn!(
                operation,
                %account_id,
                error = %e,
                correlation_id = ?context.correlation_id,
                "Ledger operation rejected"
            ),
            Err(e) => tracing::error!(
                operation,
                %account_id,
                error = %e,
                correlation_id = ?context.correlation_id,
                "Ledger operation aborted"
            ),
        }
    }
}
