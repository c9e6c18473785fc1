//! # Seed Ledger Generator
//!
//! Records a three-month demo history for one product so the monthly views,
//! carry-forward lines and alerts have something to show during development.
//!
//! ## Usage
//! ```bash
//! # Seed the default product into ./stockbook_dev.db
//! cargo run -p stockbook-ledger --bin seed
//!
//! # Another database or product
//! cargo run -p stockbook-ledger --bin seed -- --db ./data/stock.db --product chips-150
//! ```
//!
//! ## Generated History
//! - December: two deliveries, weekly sales, one damaged crate
//! - January: sales drawn from December batches, an expiry write-off,
//!   a customer return and a count correction
//! - February: one delivery and steady sales
//!
//! Dates are fixed; re-running against a seeded product is skipped.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

use stockbook_ledger::{
    AddStock, AdjustStock, LedgerConfig, NoCatalog, ReturnStock, SellStock, StockLedger,
    WriteOff,
};

/// One demo movement, in date order.
enum Movement {
    /// units, unit cost in cents, batch, days until expiry
    Delivery(i64, i64, &'static str, i64),
    Sale(i64),
    Damage(i64, &'static str),
    Expiry(i64),
    Return(i64),
    Count(i64),
}

const HISTORY: &[((i32, u32, u32), Movement)] = &[
    ((2024, 12, 2), Movement::Delivery(48, 45, "LOT-2412-A", 40)),
    ((2024, 12, 6), Movement::Sale(9)),
    ((2024, 12, 13), Movement::Sale(11)),
    ((2024, 12, 16), Movement::Delivery(24, 47, "LOT-2412-B", 60)),
    ((2024, 12, 18), Movement::Damage(2, "LOT-2412-B")),
    ((2024, 12, 20), Movement::Sale(14)),
    ((2024, 12, 27), Movement::Sale(7)),
    ((2025, 1, 3), Movement::Sale(6)),
    ((2025, 1, 10), Movement::Sale(8)),
    ((2025, 1, 12), Movement::Expiry(3)),
    ((2025, 1, 14), Movement::Return(2)),
    ((2025, 1, 17), Movement::Sale(5)),
    ((2025, 1, 31), Movement::Count(-1)),
    ((2025, 2, 3), Movement::Delivery(36, 46, "LOT-2502-A", 90)),
    ((2025, 2, 7), Movement::Sale(12)),
    ((2025, 2, 14), Movement::Sale(10)),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./stockbook_dev.db");
    let mut venue_id = String::from("arena-1");
    let mut product_id = String::from("cola-330");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--venue" | "-v" => {
                if i + 1 < args.len() {
                    venue_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--product" | "-p" => {
                if i + 1 < args.len() {
                    product_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockbook Seed Ledger Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>         Database file path (default: ./stockbook_dev.db)");
                println!("  -v, --venue <ID>        Venue id (default: arena-1)");
                println!("  -p, --product <ID>      Product id (default: cola-330)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Stockbook Seed Ledger Generator");
    println!("==================================");
    println!("Database: {}", db_path);
    println!("Venue:    {}", venue_id);
    println!("Product:  {}", product_id);
    println!();

    let mut config = LedgerConfig::load_or_default(None);
    config.database.path = PathBuf::from(&db_path);

    let ledger = StockLedger::open(config, Arc::new(NoCatalog)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = ledger
        .database()
        .ledgers()
        .list_for_product(&venue_id, &product_id)
        .await?;
    if !existing.is_empty() {
        println!("⚠ Product already has {} monthly documents", existing.len());
        println!("  Skipping seed to avoid duplicate batches.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Recording movements...");
    let start = std::time::Instant::now();
    let mut recorded = 0;

    for ((year, month, day), movement) in HISTORY {
        let date = ymd(*year, *month, *day)?;
        let actor = Some("seed".to_string());
        let venue_id = venue_id.clone();
        let product_id = product_id.clone();

        let result = match *movement {
            Movement::Delivery(quantity, cost, batch, shelf_days) => {
                ledger
                    .record_addition(AddStock {
                        venue_id,
                        product_id,
                        quantity,
                        unit_cost_cents: cost,
                        batch_number: batch.to_string(),
                        expire_date: Some(date + chrono::Duration::days(shelf_days)),
                        date,
                        actor,
                        note: Some("supplier delivery".to_string()),
                    })
                    .await
            }
            Movement::Sale(quantity) => {
                ledger
                    .record_sale(SellStock {
                        venue_id,
                        product_id,
                        quantity,
                        date,
                        actor: Some("till-1".to_string()),
                        note: None,
                    })
                    .await
            }
            Movement::Damage(quantity, batch) => {
                ledger
                    .record_damage(WriteOff {
                        venue_id,
                        product_id,
                        quantity,
                        batch_number: Some(batch.to_string()),
                        date,
                        actor,
                        note: Some("dropped crate".to_string()),
                    })
                    .await
            }
            Movement::Expiry(quantity) => {
                ledger
                    .record_expiry(WriteOff {
                        venue_id,
                        product_id,
                        quantity,
                        batch_number: None,
                        date,
                        actor,
                        note: None,
                    })
                    .await
            }
            Movement::Return(quantity) => {
                ledger
                    .record_return(ReturnStock {
                        venue_id,
                        product_id,
                        quantity,
                        batch_number: None,
                        expire_date: None,
                        unit_cost_cents: Some(45),
                        date,
                        actor: Some("till-1".to_string()),
                        note: Some("unopened".to_string()),
                    })
                    .await
            }
            Movement::Count(quantity) => {
                ledger
                    .record_adjustment(AdjustStock {
                        venue_id,
                        product_id,
                        quantity,
                        actor: "manager".to_string(),
                        reason: Some("month-end count".to_string()),
                        batch_number: None,
                        expire_date: None,
                        date,
                    })
                    .await
            }
        };

        match result {
            Ok(_) => recorded += 1,
            Err(e) => eprintln!("Failed to record movement on {}: {}", date, e),
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Recorded {} movements in {:?}", recorded, elapsed);

    println!();
    println!("Monthly views:");
    for (year, month) in [(2024, 12), (2025, 1), (2025, 2)] {
        let view = ledger.monthly_view(&venue_id, &product_id, year, month).await?;
        println!(
            "  {}: carry-forward {:>3}, added {:>3}, used {:>3}, expired {:>3}, damaged {:>3}, closing {:>3}",
            view.period,
            view.carry_forward,
            view.totals.total_stock_added,
            view.totals.total_used_stock,
            view.totals.total_expired_stock,
            view.totals.total_damage_stock,
            view.closing_balance,
        );
    }

    println!();
    println!(
        "Current balance: {}",
        ledger.current_balance(&venue_id, &product_id).await?
    );

    let batches = ledger.outstanding_batches(&venue_id, &product_id).await?;
    println!("Outstanding batches: {}", batches.len());
    for batch in &batches {
        println!(
            "  {:<16} {:>3} of {:>3} left",
            batch.batch_number, batch.remaining_quantity, batch.original_quantity
        );
    }

    if let Some(summary) = ledger
        .monthly_summary(&venue_id, &product_id, 2025, 2)
        .await?
    {
        println!();
        println!("February summary:");
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let alerts = ledger.active_alerts(&venue_id, &product_id).await?;
    println!();
    println!("Active alerts: {}", alerts.len());
    for alert in &alerts {
        println!("  [{:?}] {}", alert.severity, alert.message);
    }

    ledger.database().close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("invalid date {}-{}-{}", year, month, day).into())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockbook=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
