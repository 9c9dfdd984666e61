use accrual_reconciler::application::pipeline::ReconciliationPipeline;
use accrual_reconciler::config::PipelineConfig;
use accrual_reconciler::domain::ports::SharedOrderStore;
use accrual_reconciler::infrastructure::http_oracle::HttpAccrualOracle;
use accrual_reconciler::infrastructure::in_memory::InMemoryOrderStore;
#[cfg(feature = "storage-rocksdb")]
use accrual_reconciler::infrastructure::rocksdb::RocksDBOrderStore;
use accrual_reconciler::interfaces::csv::{OrderReader, OrderWriter};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Order snapshots CSV (order,status,accrual,user_id) loaded before the pipeline starts
    input: Option<PathBuf>,

    /// Base URL of the accrual oracle
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS")]
    accrual_address: String,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Maximum number of concurrent reconciliation workers
    #[arg(long, env = "RECONCILER_MAX_WORKERS", default_value_t = 3)]
    max_workers: usize,

    #[arg(long, env = "RECONCILER_WORK_QUEUE_CAPACITY", default_value_t = 3)]
    work_queue_capacity: usize,

    #[arg(long, env = "RECONCILER_RESULT_CHANNEL_CAPACITY", default_value_t = 20)]
    result_channel_capacity: usize,

    /// Buffered results that trigger a background batch write
    #[arg(long, env = "RECONCILER_BATCH_SIZE", default_value_t = 10)]
    batch_size: usize,

    #[arg(long, env = "RECONCILER_POLL_INTERVAL_MS", default_value_t = 500)]
    poll_interval_ms: u64,

    #[arg(long, env = "RECONCILER_SCALE_INTERVAL_MS", default_value_t = 500)]
    scale_interval_ms: u64,

    #[arg(long, env = "RECONCILER_FLUSH_INTERVAL_MS", default_value_t = 500)]
    flush_interval_ms: u64,

    #[arg(long, env = "RECONCILER_ORACLE_TIMEOUT_MS", default_value_t = 3000)]
    oracle_timeout_ms: u64,

    #[arg(long, env = "RECONCILER_FLUSH_TIMEOUT_MS", default_value_t = 500)]
    flush_timeout_ms: u64,

    #[arg(long, env = "RECONCILER_WORKER_IDLE_TIMEOUT_MS", default_value_t = 30_000)]
    worker_idle_timeout_ms: u64,

    /// Stop after this many milliseconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_for_ms: Option<u64>,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_workers: self.max_workers,
            work_queue_capacity: self.work_queue_capacity,
            result_channel_capacity: self.result_channel_capacity,
            batch_size: self.batch_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            scale_interval: Duration::from_millis(self.scale_interval_ms),
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            oracle_timeout: Duration::from_millis(self.oracle_timeout_ms),
            flush_timeout: Duration::from_millis(self.flush_timeout_ms),
            worker_idle_timeout: Duration::from_millis(self.worker_idle_timeout_ms),
        }
    }
}

fn open_store(db_path: Option<&Path>) -> Result<SharedOrderStore> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBOrderStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryOrderStore::new()))
        }
        None => Ok(Arc::new(InMemoryOrderStore::new())),
    }
}

async fn load_orders(store: &SharedOrderStore, input: &Path) -> Result<usize> {
    let file = File::open(input).into_diagnostic()?;
    let mut loaded = 0;
    for order in OrderReader::new(file).orders() {
        match order {
            Ok(order) => {
                store.register_order(order).await.into_diagnostic()?;
                loaded += 1;
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed order row"),
        }
    }
    Ok(loaded)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accrual_reconciler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.pipeline_config();
    config.validate().into_diagnostic()?;

    let store = open_store(cli.db_path.as_deref())?;
    if let Some(input) = &cli.input {
        let loaded = load_orders(&store, input).await?;
        tracing::info!(loaded, path = %input.display(), "orders loaded");
    }

    let oracle = HttpAccrualOracle::new(cli.accrual_address.as_str(), config.oracle_timeout)
        .into_diagnostic()?;
    let pipeline = ReconciliationPipeline::start(config, Arc::clone(&store), Arc::new(oracle))
        .into_diagnostic()?;

    match cli.run_for_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => tokio::signal::ctrl_c().await.into_diagnostic()?,
    }

    pipeline.shutdown().await;

    // Final order states go to stdout; logs stay on stderr.
    let orders = store.all_orders().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(orders).into_diagnostic()?;

    Ok(())
}
