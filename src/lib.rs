//! wallet_ledger library
//!
//! Multi-currency wallet ledger: atomic deposits, withdrawals and transfers
//! over a pluggable account and ledger store.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
mod error;
pub mod jobs;
pub mod query;
pub mod reporting;
pub mod store;

pub use config::{Config, LedgerLimits};
pub use domain::{Account, Amount, Balance, Currency, DomainError, LedgerEntry, OperationContext};
pub use engine::TransferEngine;
pub use error::{AppError, AppResult, ErrorResponse};
