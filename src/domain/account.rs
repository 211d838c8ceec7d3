//! Account and Wallet
//!
//! An account owns at most one wallet per currency. Wallets are keyed by
//! currency so the one-wallet-per-currency rule holds structurally.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{Amount, AmountError, Balance, Currency};

/// Per-currency balance embedded in an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    currency: Currency,
    balance: Balance,
}

impl Wallet {
    pub fn empty(currency: Currency) -> Self {
        Self {
            currency,
            balance: Balance::zero(),
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }
}

/// Registered wallet holder
///
/// Only the transfer engine changes `wallets` and `daily_transfer_amount`;
/// administrative actions may only flip the lifecycle flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    id: Uuid,
    email: String,
    username: String,
    wallets: BTreeMap<Currency, Wallet>,
    daily_transfer_amount: Decimal,
    is_active: bool,
    is_deleted: bool,
    /// Optimistic concurrency version, bumped on every committed write
    #[serde(skip)]
    version: i64,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Create a fresh, active account with no wallets
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            username: username.into(),
            wallets: BTreeMap::new(),
            daily_transfer_amount: Decimal::ZERO,
            is_active: true,
            is_deleted: false,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Rebuild an account from persisted state
    #[allow(clippy::too_many_arguments)]
    pub fn from_db_state(
        id: Uuid,
        email: String,
        username: String,
        wallets: impl IntoIterator<Item = (Currency, Decimal)>,
        daily_transfer_amount: Decimal,
        is_active: bool,
        is_deleted: bool,
        version: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AmountError> {
        let wallets = wallets
            .into_iter()
            .map(|(currency, balance)| {
                Ok((
                    currency,
                    Wallet {
                        currency,
                        balance: Balance::new(balance)?,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>, AmountError>>()?;

        Ok(Self {
            id,
            email,
            username,
            wallets,
            daily_transfer_amount,
            is_active,
            is_deleted,
            version,
            created_at,
        })
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    pub fn wallet(&self, currency: Currency) -> Option<&Wallet> {
        self.wallets.get(&currency)
    }

    /// Balance in `currency`, zero when no wallet exists
    pub fn balance(&self, currency: Currency) -> Decimal {
        self.wallets
            .get(&currency)
            .map(|w| w.balance.value())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn daily_transfer_amount(&self) -> Decimal {
        self.daily_transfer_amount
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // =========================================================================
    // Crate-internal mutation
    // =========================================================================

    /// Store a new balance, creating the wallet on first use
    pub(crate) fn put_balance(&mut self, currency: Currency, balance: Balance) {
        self.wallets
            .entry(currency)
            .or_insert_with(|| Wallet::empty(currency))
            .balance = balance;
    }

    pub(crate) fn record_outbound(&mut self, amount: &Amount) {
        self.daily_transfer_amount += amount.value();
    }

    pub(crate) fn reset_daily_transfer_amount(&mut self) {
        self.daily_transfer_amount = Decimal::ZERO;
    }

    pub(crate) fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.is_active = false;
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }
}
