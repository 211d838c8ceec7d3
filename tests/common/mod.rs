//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use wallet_ledger::api::{self, AppState};
use wallet_ledger::store::{InMemoryStore, WalletStore};
use wallet_ledger::{Account, LedgerLimits};

/// Router over a fresh in-memory store
pub struct TestApp {
    pub app: Router,
    pub store: Arc<InMemoryStore>,
}

pub fn setup_app() -> TestApp {
    setup_app_with_limits(LedgerLimits::default())
}

pub fn setup_app_with_limits(limits: LedgerLimits) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let app = api::build_app(AppState::new(store.clone(), limits));
    TestApp { app, store }
}

/// Register an account directly in the store; registration is not an API concern
pub async fn seed_account(store: &dyn WalletStore, username: &str) -> Account {
    let account = Account::new(format!("{}@example.com", username), username);
    store
        .insert_account(&account)
        .await
        .expect("Failed to seed account");
    account
}

pub fn post_json(uri: &str, account: Option<Uuid>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = account {
        builder = builder.header("X-Account-Id", id.to_string());
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get(uri: &str, account: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(id) = account {
        builder = builder.header("X-Account-Id", id.to_string());
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Read a decimal that may be serialized as a JSON string or number
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("Not a decimal string"),
        Value::Number(n) => n.to_string().parse().expect("Not a decimal number"),
        other => panic!("Expected a decimal, got {}", other),
    }
}

/// Connect to `DATABASE_URL` and empty the ledger tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE ledger_entries, wallets, accounts CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
