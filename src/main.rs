//! wallet_ledger - multi-currency wallet ledger API server
//!
//! Runs on PostgreSQL when `DATABASE_URL` is set, otherwise on the in-memory
//! store.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wallet_ledger::api::{self, AppState};
use wallet_ledger::jobs::{JobScheduler, JobSchedulerConfig};
use wallet_ledger::store::{InMemoryStore, PgStore, WalletStore};
use wallet_ledger::{db, Account, Config};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wallet_ledger=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Pick the storage backend from configuration
async fn open_store(config: &Config) -> anyhow::Result<(Arc<dyn WalletStore>, Option<PgPool>)> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::connect(url, config.database_max_connections).await?;
            db::verify_connection(&pool).await?;

            if !db::check_schema(&pool).await? {
                tracing::error!("Database schema is not complete. Please run migrations.");
                return Err(anyhow::anyhow!("Database schema incomplete"));
            }

            tracing::info!("Database connected successfully");
            let store: Arc<dyn WalletStore> = Arc::new(PgStore::new(pool.clone()));
            Ok((store, Some(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, state is lost on exit");
            let store: Arc<dyn WalletStore> = Arc::new(InMemoryStore::new());
            if config.seed_demo_accounts {
                seed_demo_accounts(store.as_ref()).await?;
            }
            Ok((store, None))
        }
    }
}

async fn seed_demo_accounts(store: &dyn WalletStore) -> anyhow::Result<()> {
    for (email, username) in [("alice@example.com", "alice"), ("bob@example.com", "bob")] {
        let account = Account::new(email, username);
        store.insert_account(&account).await?;
        tracing::info!(account_id = %account.id(), email, "Seeded demo account");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_json);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(
        environment = %config.environment,
        min_amount = %config.limits.min_transaction_amount,
        max_amount = %config.limits.max_transaction_amount,
        daily_limit = %config.limits.daily_transfer_limit,
        "Starting wallet_ledger server"
    );

    let (store, pool) = open_store(&config).await?;

    let scheduler = JobScheduler::with_config(
        store.clone(),
        JobSchedulerConfig {
            daily_reset_check_interval: config.reset_check_interval,
        },
    )
    .start();

    let app = api::build_app(AppState::new(store, config.limits.clone())).layer(CorsLayer::permissive());

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    scheduler.abort();
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }
    tracing::info!("Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
