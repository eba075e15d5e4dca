//! # Development Seed
//!
//! Prepares a fiscal database for local development: a permit valid for
//! the next year and a provisioned account with a monthly quota.
//!
//! ## Usage
//! ```bash
//! # Defaults: ./washpos_dev.db, account "dev-account", limit 100
//! cargo run -p washpos-db --bin seed
//!
//! # Custom quota and account
//! cargo run -p washpos-db --bin seed -- --account acct-42 --limit 500
//!
//! # Specify database path
//! cargo run -p washpos-db --bin seed -- --db ./data/fiscal.db
//! ```

use chrono::{Duration, Utc};
use std::env;
use washpos_core::{AccountUsage, FiscalPermit};
use washpos_db::{Database, DbConfig, FiscalStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./washpos_dev.db");
    let mut account_id = String::from("dev-account");
    let mut limit: i64 = 100;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--account" | "-a" => {
                if i + 1 < args.len() {
                    account_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--limit" | "-l" => {
                if i + 1 < args.len() {
                    limit = args[i + 1].parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("WashPOS Fiscal Seed");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: ./washpos_dev.db)");
                println!("  -a, --account <ID>    Account to provision (default: dev-account)");
                println!("  -l, --limit <N>       Monthly document limit (default: 100)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 WashPOS Fiscal Seed");
    println!("======================");
    println!("Database: {}", db_path);
    println!("Account:  {} (limit {}/month)", account_id, limit.max(1));
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let store = db.store();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let now = Utc::now();
    let today = now.date_naive();
    let mut tx = store.begin().await?;

    if tx.fiscal_permit().await?.is_some() {
        println!("⚠ A fiscal permit already exists, keeping it");
    } else {
        let permit = FiscalPermit {
            permit_number: "12345678".to_string(),
            valid_from: Some(today),
            valid_to: Some(today + Duration::days(365)),
            establishment_code: "001".to_string(),
            point_of_sale_code: "001".to_string(),
        };
        tx.save_fiscal_permit(&permit, now).await?;
        println!(
            "✓ Permit {} valid until {}",
            permit.permit_number,
            today + Duration::days(365)
        );
    }

    if tx.lock_account_usage(&account_id).await?.is_some() {
        println!("⚠ Account {} already provisioned, keeping it", account_id);
    } else {
        tx.insert_account_usage(&AccountUsage::new(&account_id, limit.max(1), now))
            .await?;
        println!("✓ Account {} provisioned", account_id);
    }

    tx.commit().await?;

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
