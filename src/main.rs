use actix_web::{App, HttpServer, web};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storefront::application::coupon_ledger::CouponLedger;
use storefront::application::order_service::OrderService;
use storefront::application::reconciliation::ReconciliationEngine;
use storefront::config::AppConfig;
use storefront::domain::coupon::NewCoupon;
use storefront::domain::payment_code::{PaymentCode, TimestampedCodeGenerator};
use storefront::domain::ports::{CouponStoreRef, OrderStoreRef};
use storefront::infrastructure::in_memory::{InMemoryCouponStore, InMemoryOrderStore};
use storefront::interfaces::csv::report_writer::{ReconciliationRow, ReportWriter, write_orders};
use storefront::interfaces::csv::statement_reader::StatementReader;
use storefront::interfaces::http::{AppState, configure_routes};
use storefront::telemetry;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Overrides STOREFRONT_HOST
        #[arg(long)]
        host: Option<String>,
        /// Overrides STOREFRONT_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Replay a bank statement CSV through payment reconciliation
    Reconcile {
        /// CSV with content,transferAmount[,transactionDate] columns
        statement: PathBuf,
    },
    /// Print every order as CSV
    Orders,
    /// Register a discount coupon
    AddCoupon {
        code: String,
        /// Discount percentage, 1 to 100
        #[arg(long)]
        percent: u8,
        /// Maximum redemptions, 0 for unlimited
        #[arg(long, default_value_t = 0)]
        limit: u32,
        /// RFC 3339 expiry timestamp
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
}

struct Stores {
    orders: OrderStoreRef,
    coupons: CouponStoreRef,
}

fn in_memory_stores() -> Stores {
    Stores {
        orders: Arc::new(InMemoryOrderStore::new()),
        coupons: Arc::new(InMemoryCouponStore::new()),
    }
}

fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = storefront::infrastructure::rocksdb::RocksDBStore::open(path)?;
            info!(path = %path.display(), "using RocksDB storage");
            Ok(Stores {
                orders: Arc::new(store.clone()),
                coupons: Arc::new(store),
            })
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            warn!(
                path = %path.display(),
                "--db-path requires the 'storage-rocksdb' feature; falling back to in-memory storage"
            );
            Ok(in_memory_stores())
        }
        None => Ok(in_memory_stores()),
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    telemetry::init(config.log_format)?;

    let stores = open_stores(cli.db_path.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => serve(config, stores, host, port).await,
        Command::Reconcile { statement } => reconcile(stores, &statement).await,
        Command::Orders => export_orders(stores).await,
        Command::AddCoupon {
            code,
            percent,
            limit,
            expires_at,
        } => {
            let coupon = CouponLedger::new(stores.coupons)
                .register(NewCoupon {
                    code,
                    discount_percent: percent,
                    usage_limit: limit,
                    expires_at,
                })
                .await?;
            let limit = match coupon.usage_limit {
                0 => "unlimited".to_string(),
                n => n.to_string(),
            };
            println!(
                "Registered coupon {} ({}% off, limit {})",
                coupon.code, coupon.discount_percent, limit
            );
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, stores: Stores, host: Option<String>, port: Option<u16>) -> Result<()> {
    let api_key = config.require_webhook_key()?;
    let state = AppState::new(stores.orders, stores.coupons, api_key, config.bank.clone());

    let (host, port) = config.bind_address(host, port);
    info!(%host, port, "starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind((host, port))
    .into_diagnostic()?
    .run()
    .await
    .into_diagnostic()
}

async fn reconcile(stores: Stores, statement: &Path) -> Result<()> {
    let engine = ReconciliationEngine::new(stores.orders, CouponLedger::new(stores.coupons));
    let file = File::open(statement).into_diagnostic()?;

    let mut report = ReportWriter::new(io::stdout().lock());
    for (index, entry) in StatementReader::new(file).entries().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(line, error = %e, "skipping malformed statement row");
                continue;
            }
        };
        let amount = match entry.amount() {
            Ok(amount) => amount,
            Err(e) => {
                warn!(line, error = %e, "skipping malformed statement row");
                continue;
            }
        };

        let reference = PaymentCode::find_in(&entry.content);
        let outcome = match &reference {
            Some(code) => engine.confirm(code, amount).await?.as_str(),
            None => "no_reference",
        };
        report.write_row(&ReconciliationRow {
            content: entry.content,
            amount: entry.transfer_amount,
            reference: reference.map(|code| code.to_string()),
            outcome: outcome.to_string(),
        })?;
    }
    report.finish()?;
    Ok(())
}

async fn export_orders(stores: Stores) -> Result<()> {
    let service = OrderService::new(
        stores.orders,
        CouponLedger::new(stores.coupons),
        Arc::new(TimestampedCodeGenerator),
    );
    let orders = service.all_orders().await?;
    write_orders(io::stdout().lock(), &orders)?;
    Ok(())
}
