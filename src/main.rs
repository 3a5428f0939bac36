use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payment_approvals::application::engine::ApprovalEngine;
use payment_approvals::application::notify::LogNotifier;
use payment_approvals::domain::ports::{
    ApprovalConfigStoreRef, ApprovalStoreRef, PaymentStoreRef,
};
use payment_approvals::infrastructure::in_memory::{
    InMemoryApprovalConfigStore, InMemoryApprovalStore, InMemoryPaymentStore,
    InProcessPrivilegedService,
};
use payment_approvals::interfaces::csv::decision_reader::DecisionReader;
use payment_approvals::interfaces::csv::payment_writer::PaymentWriter;
use payment_approvals::interfaces::project_file::ProjectFile;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input approver decisions CSV file
    input: PathBuf,

    /// TOML file with project approval policies and payments
    #[arg(long)]
    projects: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Log filter, e.g. `info` or `payment_approvals=debug`
    #[arg(long, default_value = "warn")]
    log_level: String,
}

struct Stores {
    payments: PaymentStoreRef,
    approvals: ApprovalStoreRef,
    configs: ApprovalConfigStoreRef,
}

fn in_memory_stores() -> Stores {
    Stores {
        payments: Arc::new(InMemoryPaymentStore::new()),
        approvals: Arc::new(InMemoryApprovalStore::new()),
        configs: Arc::new(InMemoryApprovalConfigStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use payment_approvals::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Stores {
                payments: Arc::new(store.clone()),
                approvals: Arc::new(store.clone()),
                configs: Arc::new(store),
            })
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let stores = open_stores(cli.db_path)?;
    let privileged = Arc::new(InProcessPrivilegedService::new(stores.payments.clone()));
    let engine = ApprovalEngine::from_ports(
        stores.payments,
        stores.approvals,
        stores.configs.clone(),
        privileged,
        Arc::new(LogNotifier),
    );

    let projects = ProjectFile::from_file(&cli.projects).into_diagnostic()?;
    projects
        .load_into(stores.configs.as_ref(), &engine)
        .await
        .into_diagnostic()?;

    let file = File::open(cli.input).into_diagnostic()?;
    for row in DecisionReader::new(file).decisions() {
        let result = match row.and_then(|row| row.into_parts()) {
            Ok((payment_id, approver, request)) => {
                engine.decide(payment_id, &approver, request).await
            }
            Err(e) => {
                tracing::error!("Error reading decision: {}", e);
                continue;
            }
        };
        if let Err(e) = result {
            tracing::error!("Error processing decision: {}", e);
        }
    }
    engine.drain_notifications().await;

    let payments = engine.payments().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = PaymentWriter::new(stdout.lock());
    writer.write_payments(payments).into_diagnostic()?;

    Ok(())
}
