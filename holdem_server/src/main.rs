//! Multi-table hold'em server using one actor per table.
//!
//! Recovers persisted tables before accepting connections, then serves
//! the WebSocket API until Ctrl+C, closing every table on the way out.

use std::{sync::Arc, time::Duration};

use anyhow::{Error, anyhow};
use holdem_engine::{
    db::{Database, InMemoryTableRepository, TableRepository},
    recovery::recover_tables,
    security::ActionRateLimiter,
    table::TableManager,
};
use holdem_server::{
    api::{self, AppState},
    config::{CliOverrides, ServerConfig},
    logging, metrics,
};
use pico_args::Arguments;
use tracing::{debug, error, info, warn};

const HELP: &str = "\
Run a multi-table hold'em server

USAGE:
  holdem_server [OPTIONS]

OPTIONS:
  --bind          IP:PORT   Server socket bind address   [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url        URL       Database connection string   [default: env DATABASE_URL]
  --tables        N         Tables to create when none were recovered  [default: env MAX_TABLES or 1]
  --metrics-bind  IP:PORT   Prometheus scrape address    [default: env METRICS_BIND, disabled if unset]

FLAGS:
  --in-memory               Keep all state in memory, nothing survives a restart
  -h, --help                Print help information

ENVIRONMENT:
  RUST_LOG                  Log filter (e.g. info,holdem_engine=debug)
  TABLE_SMALL_BLIND, TABLE_BIG_BLIND, TABLE_MIN_BUY_IN, TABLE_MAX_BUY_IN,
  TABLE_MAX_PLAYERS, TABLE_SPEED, TABLE_HAND_INTERVAL_MS
  RATE_LIMIT_ACTIONS_PER_SEC, RATE_LIMIT_ACTION_BURST, RECOVERY_GRACE_SECS
  (See .env file for all configuration options)
";

/// How often idle rate limiter buckets are dropped, and after how long.
const BUCKET_PRUNE_INTERVAL: Duration = Duration::from_secs(60);
const BUCKET_MAX_IDLE: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        num_tables: pargs.opt_value_from_str("--tables")?,
        metrics_bind: pargs.opt_value_from_str("--metrics-bind")?,
        in_memory: pargs.contains("--in-memory"),
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;
    info!("Starting hold'em server at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow!(e))?;
        info!("Prometheus metrics on http://{addr}/metrics");
    }

    let repository: Arc<dyn TableRepository> = match &config.database {
        Some(db_config) => {
            let db = Database::new(db_config)
                .await
                .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
            let repository = db.table_repository();
            repository.migrate().await?;
            info!("Database connected and migrated");
            Arc::new(repository)
        }
        None => {
            warn!("Running in memory, tables and chips won't survive a restart");
            Arc::new(InMemoryTableRepository::new())
        }
    };

    let rate_limiter = Arc::new(ActionRateLimiter::new(config.rate_limit.clone()));
    let table_manager = Arc::new(TableManager::new(repository.clone(), rate_limiter.clone()));

    // Recovery runs before the listener exists, so no client sees a
    // half-restored table.
    let report = recover_tables(repository.as_ref(), &table_manager, &config.recovery).await?;
    metrics::recovery(&report);
    if !report.is_complete() {
        warn!("{} table(s) could not be recovered", report.failures.len());
    }

    if report.recovered.is_empty() {
        info!("Creating {} initial table(s)...", config.num_tables);
        for i in 0..config.num_tables {
            let table_config = config.table_defaults.table_config(format!("Table {}", i + 1));
            match table_manager.create_table(table_config).await {
                Ok(table_id) => info!("Created table {} with ID {}", i + 1, table_id),
                Err(e) => error!("Failed to create table {}: {}", i + 1, e),
            }
        }
    }

    let active_count = table_manager.active_table_count().await;
    metrics::active_tables(active_count);
    info!("Server ready with {} active table(s)", active_count);

    let pruner = tokio::spawn(prune_idle_buckets(rate_limiter));

    let app = api::create_router(AppState {
        table_manager: table_manager.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!("Server is running at http://{}. Press Ctrl+C to stop.", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    pruner.abort();
    table_manager.shutdown().await;
    metrics::active_tables(0);
    info!("All tables closed");

    Ok(())
}

async fn prune_idle_buckets(rate_limiter: Arc<ActionRateLimiter>) {
    let mut interval = tokio::time::interval(BUCKET_PRUNE_INTERVAL);
    loop {
        interval.tick().await;
        let pruned = rate_limiter.prune_idle(BUCKET_MAX_IDLE);
        if pruned > 0 {
            debug!("Dropped {pruned} idle rate limit buckets");
        }
    }
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}
