//! # Fiscal Status
//!
//! Startup diagnostics for a fiscal database: configuration, migrations,
//! vault key source, permit status and integration credentials.
//!
//! ## Usage
//! ```bash
//! # Uses WASHPOS_* environment variables
//! cargo run -p washpos-fiscal --bin fiscal-status
//!
//! # More detail
//! RUST_LOG=debug cargo run -p washpos-fiscal --bin fiscal-status
//! ```
//!
//! Prints a JSON summary on stdout. Exits non-zero when the configuration
//! is unusable (for example production without an encryption key).

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use washpos_core::PermitStatus;
use washpos_db::migrations::migration_status;
use washpos_fiscal::{FiscalConfig, FiscalServices};
use washpos_vault::KeySource;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "Fiscal status check failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = FiscalConfig::from_env()?;
    let (services, db) = FiscalServices::open(&config).await?;

    let (total, applied) = migration_status(db.pool()).await?;
    info!(total, applied, "Migration status");

    let key_source = services.credentials.key_source();
    if key_source == KeySource::InsecureDefault {
        warn!(
            key_source = key_source.as_str(),
            "Credential vault is using the insecure default key"
        );
    } else {
        info!(key_source = key_source.as_str(), "Credential vault key");
    }

    let now = Utc::now();
    let permit = services.permits.permit_status(now).await?;
    match permit.status {
        PermitStatus::Valid => info!(days_left = ?permit.days_left, "Fiscal permit valid"),
        PermitStatus::ExpiringSoon => {
            warn!(days_left = ?permit.days_left, "Fiscal permit expiring soon")
        }
        _ => warn!(error = ?permit.error, "Fiscal permit blocks issuance"),
    }

    let credentials = services.credentials.view().await?;
    info!(
        mode = ?credentials.mode,
        active = credentials.active,
        has_auth_token = credentials.has_auth_token,
        has_certificate = credentials.has_certificate,
        "Integration credentials"
    );

    let summary = json!({
        "environment": config.environment.as_str(),
        "database": config.database_path.display().to_string(),
        "healthy": db.health_check().await,
        "migrations": { "total": total, "applied": applied },
        "keySource": key_source.as_str(),
        "permit": permit,
        "credentials": credentials,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the default
/// filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,washpos=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
