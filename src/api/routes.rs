//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    routing::{delete, get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LedgerLimits;
use crate::domain::{Currency, DomainError, LedgerEntry, OperationContext};
use crate::engine::{
    DepositCommand, MovementResult, ReceiverRef, TransferCommand, TransferEngine, WithdrawCommand,
};
use crate::error::{AppError, AppResult};
use crate::query::{QueryService, DEFAULT_HISTORY_LIMIT};
use crate::reporting::{BalanceRank, ReportingService, VolumeRank, DEFAULT_REPORT_LIMIT};
use crate::store::WalletStore;

use super::middleware::{FraudVerdict, RequestAccount, ACCOUNT_ID_HEADER};

// =========================================================================
// Application state
// =========================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WalletStore>,
    pub engine: TransferEngine,
    pub queries: QueryService,
    pub reports: ReportingService,
}

impl AppState {
    pub fn new(store: Arc<dyn WalletStore>, limits: LedgerLimits) -> Self {
        Self {
            engine: TransferEngine::new(store.clone(), limits),
            queries: QueryService::new(store.clone()),
            reports: ReportingService::new(store.clone()),
            store,
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

fn default_currency() -> String {
    Currency::default().code().to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyRequest {
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default)]
    pub receiver_id: Option<Uuid>,
    #[serde(default)]
    pub receiver_email: Option<String>,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    pub message: String,
    pub transaction: LedgerEntry,
    pub new_balance: Decimal,
}

impl MovementResponse {
    fn new(message: &str, result: MovementResult) -> Self {
        Self {
            message: message.to_string(),
            transaction: result.entry,
            new_balance: result.new_balance,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
    pub currency: Currency,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "default_report_limit")]
    pub limit: usize,
}

fn default_report_limit() -> usize {
    DEFAULT_REPORT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct FlaggedResponse {
    pub transactions: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize)]
pub struct TotalBalancesResponse {
    pub balances: BTreeMap<Currency, Decimal>,
}

#[derive(Debug, Serialize)]
pub struct RankingResponse<T> {
    pub users: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// =========================================================================
// Extraction helpers
// =========================================================================

fn acting_account(account: Option<Extension<RequestAccount>>) -> AppResult<Uuid> {
    account
        .map(|Extension(a)| a.account_id)
        .ok_or_else(|| AppError::MissingHeader(ACCOUNT_ID_HEADER.to_string()))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| DomainError::invalid_input(rejection.body_text()).into())
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params
        .map(|Query(inner)| inner)
        .map_err(|rejection| DomainError::invalid_input(rejection.body_text()).into())
}

fn path_param<T>(id: Result<Path<T>, PathRejection>) -> AppResult<T> {
    id.map(|Path(inner)| inner)
        .map_err(|rejection| DomainError::invalid_input(rejection.body_text()).into())
}

fn currency_or_default(raw: Option<&str>) -> AppResult<Currency> {
    match raw {
        Some(code) => code
            .parse()
            .map_err(|e: crate::domain::CurrencyError| DomainError::invalid_input(e.to_string()).into()),
        None => Ok(Currency::default()),
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Wallet operations for the acting account
        .route("/wallet/deposit", post(deposit))
        .route("/wallet/withdraw", post(withdraw))
        .route("/wallet/transfer", post(transfer))
        .route("/wallet/balance", get(get_balance))
        .route("/wallet/history", get(get_history))
        // Administrative reporting
        .route("/admin/flagged-transactions", get(flagged_transactions))
        .route("/admin/total-balances", get(total_balances))
        .route("/admin/top-users/balance", get(top_users_by_balance))
        .route("/admin/top-users/volume", get(top_users_by_volume))
        .route("/admin/users/:account_id", delete(delete_account))
        .route("/admin/transactions/:entry_id", delete(delete_transaction))
}

// =========================================================================
// POST /wallet/deposit
// =========================================================================

async fn deposit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Extension(FraudVerdict(fraud)): Extension<FraudVerdict>,
    account: Option<Extension<RequestAccount>>,
    payload: Result<Json<MoneyRequest>, JsonRejection>,
) -> AppResult<Json<MovementResponse>> {
    let account_id = acting_account(account)?;
    let request = body(payload)?;

    let mut command = DepositCommand::new(account_id, request.amount, request.currency).with_fraud(fraud);
    if let Some(description) = request.description {
        command = command.with_description(description);
    }

    let result = state.engine.deposit(command, &context).await?;
    Ok(Json(MovementResponse::new("Deposit successful", result)))
}

// =========================================================================
// POST /wallet/withdraw
// =========================================================================

async fn withdraw(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Extension(FraudVerdict(fraud)): Extension<FraudVerdict>,
    account: Option<Extension<RequestAccount>>,
    payload: Result<Json<MoneyRequest>, JsonRejection>,
) -> AppResult<Json<MovementResponse>> {
    let account_id = acting_account(account)?;
    let request = body(payload)?;

    let mut command = WithdrawCommand::new(account_id, request.amount, request.currency).with_fraud(fraud);
    if let Some(description) = request.description {
        command = command.with_description(description);
    }

    let result = state.engine.withdraw(command, &context).await?;
    Ok(Json(MovementResponse::new("Withdrawal successful", result)))
}

// =========================================================================
// POST /wallet/transfer
// =========================================================================

async fn transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Extension(FraudVerdict(fraud)): Extension<FraudVerdict>,
    account: Option<Extension<RequestAccount>>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> AppResult<Json<MovementResponse>> {
    let sender_id = acting_account(account)?;
    let request = body(payload)?;
    let receiver = ReceiverRef::from_parts(request.receiver_id, request.receiver_email)?;

    let mut command =
        TransferCommand::new(sender_id, receiver, request.amount, request.currency).with_fraud(fraud);
    if let Some(description) = request.description {
        command = command.with_description(description);
    }

    let result = state.engine.transfer(command, &context).await?;
    Ok(Json(MovementResponse::new("Transfer successful", result)))
}

// =========================================================================
// GET /wallet/balance
// =========================================================================

async fn get_balance(
    State(state): State<AppState>,
    account: Option<Extension<RequestAccount>>,
    params: Result<Query<BalanceQuery>, QueryRejection>,
) -> AppResult<Json<BalanceResponse>> {
    let query = query_params(params)?;
    let account_id = acting_account(account)?;
    let currency = currency_or_default(query.currency.as_deref())?;

    let balance = state.queries.get_balance(account_id, currency).await?;
    Ok(Json(BalanceResponse { balance, currency }))
}

// =========================================================================
// GET /wallet/history
// =========================================================================

async fn get_history(
    State(state): State<AppState>,
    account: Option<Extension<RequestAccount>>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let query = query_params(params)?;
    let account_id = acting_account(account)?;

    let entries = state.queries.get_history(account_id, query.limit).await?;
    Ok(Json(entries))
}

// =========================================================================
// Admin: reporting
// =========================================================================

async fn flagged_transactions(State(state): State<AppState>) -> AppResult<Json<FlaggedResponse>> {
    let transactions = state.reports.flagged_transactions().await?;
    Ok(Json(FlaggedResponse { transactions }))
}

async fn total_balances(State(state): State<AppState>) -> AppResult<Json<TotalBalancesResponse>> {
    let balances = state.reports.total_balances().await?;
    Ok(Json(TotalBalancesResponse { balances }))
}

async fn top_users_by_balance(
    State(state): State<AppState>,
    params: Result<Query<RankingQuery>, QueryRejection>,
) -> AppResult<Json<RankingResponse<BalanceRank>>> {
    let query = query_params(params)?;
    let currency = currency_or_default(query.currency.as_deref())?;
    let users = state.reports.top_accounts_by_balance(currency, query.limit).await?;
    Ok(Json(RankingResponse { users }))
}

async fn top_users_by_volume(
    State(state): State<AppState>,
    params: Result<Query<RankingQuery>, QueryRejection>,
) -> AppResult<Json<RankingResponse<VolumeRank>>> {
    let query = query_params(params)?;
    let currency = currency_or_default(query.currency.as_deref())?;
    let users = state.reports.top_senders_by_volume(currency, query.limit).await?;
    Ok(Json(RankingResponse { users }))
}

// =========================================================================
// Admin: soft deletes
// =========================================================================

async fn delete_account(
    State(state): State<AppState>,
    account_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let account_id = path_param(account_id)?;
    state.reports.soft_delete_account(account_id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

async fn delete_transaction(
    State(state): State<AppState>,
    entry_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let entry_id = path_param(entry_id)?;
    state.reports.soft_delete_entry(entry_id).await?;
    Ok(Json(MessageResponse {
        message: "Transaction deleted successfully".to_string(),
    }))
}
