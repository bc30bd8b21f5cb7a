//! Tidemark table cleanup command.

#![forbid(unsafe_code)]

mod cleaner_config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tidemark_application::{
    CleanupRunOptions, CleanupService, CleanupTarget, RecordStore, StorageMaintenance,
    TransactionScope,
};
use tidemark_core::{AppError, AppResult};
use tidemark_domain::{RetentionPolicy, RetentionPolicyInput};
use tidemark_infrastructure::{PostgresCleanupSession, PostgresRecordStore, PostgresTableBinding};

use cleaner_config::{CleanerConfig, DEFAULT_DATABASE, TableConfig};

#[derive(Debug, Parser)]
#[command(
    name = "tidemark",
    version,
    about = "Prunes old rows from configured database tables"
)]
struct CleanerArgs {
    /// Path to the cleanup configuration file.
    #[arg(short, long, default_value = "tidemark.toml")]
    config: PathBuf,

    /// Named database connection to clean. Defaults to the "default"
    /// connection.
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,

    /// Don't actually delete records, only report what would be removed.
    #[arg(short, long)]
    dry_run: bool,

    /// Run VACUUM after a real, non-dry-run cleanup.
    #[arg(long)]
    vacuum: bool,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let args = CleanerArgs::parse();
    init_tracing(&args);

    let config = CleanerConfig::load(args.config.as_path())?;
    let database_url = config.database_url(args.database.as_str())?;
    let pool = connect_pool(database_url.as_str()).await?;

    let session = Arc::new(PostgresCleanupSession::new(pool));

    // Targets resolve before the transaction opens, so a bad table name in
    // the configuration fails fast instead of mid-batch.
    let targets = build_targets(&config, &session)?;
    if targets.is_empty() {
        warn!("no tables configured, nothing to clean");
        return Ok(());
    }

    let service = CleanupService::new(
        Arc::clone(&session) as Arc<dyn TransactionScope>,
        Arc::clone(&session) as Arc<dyn StorageMaintenance>,
    );
    let options = CleanupRunOptions {
        dry_run: args.dry_run,
        vacuum: args.vacuum,
    };

    info!(
        database = %args.database,
        tables = targets.len(),
        dry_run = args.dry_run,
        "table cleanup started"
    );

    let outcomes = tokio::select! {
        outcomes = service.run(&targets, options) => outcomes?,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the run mid-flight leaves the batch transaction
            // uncommitted; the backend rolls it back on disconnect.
            info!("interrupted, no deletions were committed");
            return Ok(());
        }
    };

    let failed_tables = outcomes
        .iter()
        .filter(|outcome| outcome.error().is_some())
        .count();
    info!(
        tables = outcomes.len(),
        failed_tables,
        "table cleanup done"
    );

    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    // The whole batch runs inside one transaction on one connection.
    PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Transaction(format!("failed to connect to database: {error}")))
}

fn build_targets(
    config: &CleanerConfig,
    session: &Arc<PostgresCleanupSession>,
) -> AppResult<Vec<CleanupTarget>> {
    config
        .tables
        .iter()
        .map(|table| build_target(table, session))
        .collect()
}

fn build_target(
    table: &TableConfig,
    session: &Arc<PostgresCleanupSession>,
) -> AppResult<CleanupTarget> {
    let binding = PostgresTableBinding::new(
        table.name.clone(),
        table.primary_key.clone(),
        table.default_ordering.clone(),
    )?;
    let policy = RetentionPolicy::new(RetentionPolicyInput {
        table_identifier: table.name.clone(),
        ordering_field: table.ordering_field.clone(),
        keep_records: table.keep_records,
        keep_since_days: table.keep_since_days,
        keep_since_hours: table.keep_since_hours,
    })?;

    Ok(CleanupTarget {
        policy,
        store: Arc::new(PostgresRecordStore::new(Arc::clone(session), binding))
            as Arc<dyn RecordStore>,
    })
}

fn init_tracing(args: &CleanerArgs) {
    let default_level = if args.quiet {
        "warn"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
