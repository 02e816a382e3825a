use clap::Parser;
use nodepool::config::{Config, LoggingConfig, WorkloadConfig};
use nodepool::pool::{Connection, HostPool};
use nodepool::transport::TcpConnector;
use nodepool::{NodePoolError, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "nodepool")]
#[command(about = "Drive a bounded connection pool against a single node", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Node address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Node port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Maximum connections to the node (overrides config)
    #[arg(long)]
    max_active: Option<usize>,

    /// Exhausted wait in milliseconds; 0 or negative waits forever (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    max_wait_ms: Option<i64>,

    /// Health-check idle connections before handing them out
    #[arg(long)]
    stale_check: bool,

    /// Concurrent workers (overrides config)
    #[arg(long)]
    workers: Option<usize>,

    /// Lease cycles per worker (overrides config)
    #[arg(long)]
    leases: Option<usize>,

    /// Generate example configuration file
    #[arg(long, value_name = "FILE")]
    generate_config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Print the final pool status as JSON
    #[arg(long)]
    json_status: bool,
}

#[derive(Debug, Default)]
struct WorkloadTally {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle config generation
    if let Some(config_path) = args.generate_config {
        println!("Generating example configuration file: {:?}", config_path);
        Config::create_example(&config_path)?;
        println!("Example configuration file created successfully!");
        println!("Edit the file and run: nodepool --config {:?}", config_path);
        return Ok(());
    }

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(host) = args.host {
        config.host.address = host;
    }
    if let Some(port) = args.port {
        config.host.port = port;
    }
    if let Some(max_active) = args.max_active {
        config.host.max_active = max_active;
    }
    if let Some(max_wait_ms) = args.max_wait_ms {
        config.host.max_wait_time_when_exhausted = max_wait_ms;
    }
    if args.stale_check {
        config.host.use_stale_connection_check = true;
    }
    if let Some(workers) = args.workers {
        config.workload.workers = workers;
    }
    if let Some(leases) = args.leases {
        config.workload.leases_per_worker = leases;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging)?;

    info!("nodepool v{} starting", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => info!("Loaded configuration from: {:?}", path),
        None => info!("No configuration file specified, using defaults"),
    }

    let connector = TcpConnector::new(&config.host);
    let pool = Arc::new(HostPool::new(config.host.clone(), connector).await?);
    info!("Pool ready: {}", pool.status_string());

    let tally = Arc::new(WorkloadTally::default());
    let started = Instant::now();

    tokio::select! {
        _ = run_workload(Arc::clone(&pool), &config.workload, Arc::clone(&tally)) => {
            info!(
                "Workload finished in {:?}: {} leases completed, {} failed",
                started.elapsed(),
                tally.completed.load(Ordering::Relaxed),
                tally.failed.load(Ordering::Relaxed)
            );
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    if args.json_status {
        let status = serde_json::to_string_pretty(&pool.status())
            .map_err(|e| NodePoolError::Config(format!("Failed to encode status: {}", e)))?;
        println!("{}", status);
    } else {
        println!("{}", pool.status_string());
    }

    pool.shutdown().await?;

    Ok(())
}

async fn run_workload(
    pool: Arc<HostPool<TcpConnector>>,
    workload: &WorkloadConfig,
    tally: Arc<WorkloadTally>,
) {
    let hold = Duration::from_millis(workload.hold_ms);
    let mut tasks = Vec::with_capacity(workload.workers);

    for worker in 0..workload.workers {
        let pool = Arc::clone(&pool);
        let tally = Arc::clone(&tally);
        let leases = workload.leases_per_worker;

        tasks.push(tokio::spawn(async move {
            for _ in 0..leases {
                let mut conn = match pool.acquire().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Worker {} failed to acquire: {}", worker, e);
                        tally.failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };

                match conn.health_check().await {
                    Ok(()) => {
                        tally.completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("Worker {} round-trip failed: {}", worker, e);
                        tally.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }

                if !hold.is_zero() {
                    tokio::time::sleep(hold).await;
                }

                pool.release(conn).await;
            }
        }));
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!("Worker task panicked: {}", e);
        }
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&logging.level)
        .map_err(|e| NodePoolError::Config(format!("Invalid log level: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    Ok(())
}
