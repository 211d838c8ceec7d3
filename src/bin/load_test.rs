//! Load Testing Tool
//!
//! Fires concurrent transfers between a ring of seeded accounts and checks
//! that no money was created or destroyed.
//!
//! Run with: cargo run --bin load_test --release -- --accounts 20 --transfers 5000
//! Add `--postgres` to run against `DATABASE_URL` instead of the in-memory store.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use uuid::Uuid;

use wallet_ledger::engine::{DepositCommand, ReceiverRef, TransferCommand, TransferEngine};
use wallet_ledger::store::{InMemoryStore, PgStore, WalletStore};
use wallet_ledger::{db, Account, AppError, Currency, DomainError, LedgerLimits, OperationContext};

fn arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Default)]
struct Outcomes {
    committed: u64,
    insufficient_funds: u64,
    daily_limit: u64,
    persistence: u64,
    other: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let account_count: usize = arg(&args, "--accounts", 20usize).max(2);
    let transfer_count: usize = arg(&args, "--transfers", 5000);
    let concurrency: usize = arg(&args, "--concurrency", 64usize).max(1);
    let seed_balance: Decimal = arg(&args, "--seed", Decimal::new(1_000, 0));

    let store: Arc<dyn WalletStore> = if args.iter().any(|a| a == "--postgres") {
        let database_url = std::env::var("DATABASE_URL")?;
        println!("Connecting to database...");
        Arc::new(PgStore::new(db::connect(&database_url, 10).await?))
    } else {
        Arc::new(InMemoryStore::new())
    };

    let engine = TransferEngine::new(store.clone(), LedgerLimits::default());
    let ctx = OperationContext::default();

    println!(
        "Load Test - {} transfers across {} accounts ({} in flight)",
        transfer_count, account_count, concurrency
    );

    let run_tag = Uuid::new_v4().simple().to_string();
    let mut ids = Vec::with_capacity(account_count);
    for i in 0..account_count {
        let account = Account::new(format!("load-{}-{}@example.com", run_tag, i), format!("load{}", i));
        store.insert_account(&account).await?;
        engine
            .deposit(DepositCommand::new(account.id(), seed_balance, Currency::Usd.code()), &ctx)
            .await?;
        ids.push(account.id());
    }
    let expected_total = seed_balance * Decimal::from(account_count as u64);
    let ids = Arc::new(ids);

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let start = Instant::now();
    let mut handles = Vec::with_capacity(transfer_count);

    for i in 0..transfer_count {
        let permit = semaphore.clone().acquire_owned().await?;
        let engine = engine.clone();
        let ids = ids.clone();

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            // Skewed pairing so a few accounts see heavy contention
            let from = ids[i % ids.len()];
            let to = ids[(i * 7 + 1) % ids.len()];
            let to = if to == from { ids[(i + 1) % ids.len()] } else { to };
            let amount = Decimal::new(((i % 50) + 1) as i64, 0);

            engine
                .transfer(
                    TransferCommand::new(from, ReceiverRef::Id(to), amount, "USD"),
                    &OperationContext::default(),
                )
                .await
        }));
    }

    let mut outcomes = Outcomes::default();
    for handle in handles {
        match handle.await? {
            Ok(_) => outcomes.committed += 1,
            Err(AppError::Domain(DomainError::InsufficientFunds { .. })) => {
                outcomes.insufficient_funds += 1
            }
            Err(AppError::Domain(DomainError::DailyLimitExceeded { .. })) => {
                outcomes.daily_limit += 1
            }
            Err(AppError::Persistence(_)) => outcomes.persistence += 1,
            Err(_) => outcomes.other += 1,
        }
    }
    let elapsed = start.elapsed();

    let mut actual_total = Decimal::ZERO;
    let mut negative = 0;
    for id in ids.iter() {
        let balance = store
            .find_account(*id)
            .await?
            .map(|a| a.balance(Currency::Usd))
            .unwrap_or_default();
        if balance < Decimal::ZERO {
            negative += 1;
        }
        actual_total += balance;
    }

    println!("\n=== Load Test Results ===");
    println!("Committed:          {}", outcomes.committed);
    println!("Insufficient funds: {}", outcomes.insufficient_funds);
    println!("Daily limit:        {}", outcomes.daily_limit);
    println!("Persistence errors: {}", outcomes.persistence);
    println!("Other errors:       {}", outcomes.other);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!(
        "Rate: {:.0} transfers/sec",
        transfer_count as f64 / elapsed.as_secs_f64()
    );
    println!("Expected total: {}  Actual total: {}", expected_total, actual_total);

    if actual_total != expected_total || negative > 0 {
        anyhow::bail!(
            "ledger invariant broken: total {} (expected {}), {} negative balances",
            actual_total,
            expected_total,
            negative
        );
    }
    println!("Conservation check passed");

    Ok(())
}
