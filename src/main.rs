use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shiv_accounts::{
    api::{self, AppState},
    books::{today, Books},
    config::{Backend, CliArgs, Command, Config, DatabaseConfig, LoggingConfig, ReportKind},
    seed,
    storage::{InMemoryStorage, StorageBackend, StorageError},
};
use shiv_core::format::{first_of_month, parse_iso_date};
use shiv_sqlite::SqliteStorage;

type BoxError = Box<dyn std::error::Error>;

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(false)).init();
    }
}

fn open_storage(db: &DatabaseConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match db.backend {
        Backend::Memory => Ok(Arc::new(InMemoryStorage::new())),
        Backend::Sqlite => Ok(Arc::new(SqliteStorage::open(&db.path)?)),
    }
}

fn cli_date(value: Option<&str>, name: &str) -> Result<Option<time::Date>, BoxError> {
    value
        .map(|v| parse_iso_date(v).ok_or_else(|| format!("--{name} must be a YYYY-MM-DD date, got {v}").into()))
        .transpose()
}

fn setup(db: &DatabaseConfig) -> Result<(), BoxError> {
    if db.backend == Backend::Memory {
        tracing::info!("In-memory backend needs no schema");
        return Ok(());
    }
    match SqliteStorage::connect(&db.path)?.setup() {
        Ok(()) => {
            tracing::info!(path = %db.path, version = shiv_sqlite::SCHEMA_VERSION, "Schema created");
            Ok(())
        }
        Err(StorageError::SchemaExists) => {
            tracing::info!(path = %db.path, "Schema already exists, nothing to do");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn reset(db: &DatabaseConfig) -> Result<(), BoxError> {
    if db.backend == Backend::Memory {
        tracing::info!("In-memory backend starts empty on every run");
        return Ok(());
    }
    SqliteStorage::connect(&db.path)?.reset()?;
    tracing::info!(path = %db.path, "Database reset");
    Ok(())
}

fn report(
    books: &Books,
    kind: ReportKind,
    as_of: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(), BoxError> {
    match kind {
        ReportKind::TrialBalance => {
            let as_of = cli_date(as_of, "as-of")?.unwrap_or_else(today);
            print!("{}", books.trial_balance(as_of)?);
        }
        ReportKind::BalanceSheet => {
            let as_of = cli_date(as_of, "as-of")?.unwrap_or_else(today);
            print!("{}", books.balance_sheet(as_of)?);
        }
        ReportKind::ProfitAndLoss => {
            let to = cli_date(to, "to")?.unwrap_or_else(today);
            let from = cli_date(from, "from")?.unwrap_or_else(|| first_of_month(to));
            print!("{}", books.profit_and_loss(from, to)?);
        }
    }
    Ok(())
}

fn install_metrics(config: &Config) -> Option<PrometheusHandle> {
    if !config.metrics.enabled {
        return None;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    }
}

async fn serve(config: Config, books: Arc<Books>) -> Result<(), BoxError> {
    let addr = config.listen_addr()?;
    if config.database.backend == Backend::Memory {
        tracing::warn!("Using the in-memory backend; everything is lost on shutdown");
    }
    if config.auth.enabled {
        tracing::info!(keys = config.auth.api_keys.len(), "API key authentication enabled");
    } else {
        tracing::warn!("Authentication disabled; every caller is an admin");
    }

    let state = AppState {
        books,
        metrics: install_metrics(&config),
    };
    let app = api::router(state, Arc::new(config.auth));

    tracing::info!(%addr, "HTTP API listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn run(command: Command, config: Config) -> Result<(), BoxError> {
    match command {
        Command::Setup => setup(&config.database),
        Command::Reset => reset(&config.database),
        Command::Seed => {
            let books = Books::new(open_storage(&config.database)?);
            let summary = seed::seed(&books)?;
            println!("Seeded {summary}");
            Ok(())
        }
        Command::Report { kind, as_of, from, to } => {
            let books = Books::new(open_storage(&config.database)?);
            report(&books, kind, as_of.as_deref(), from.as_deref(), to.as_deref())
        }
        Command::Serve => {
            let books = Arc::new(Books::new(open_storage(&config.database)?));
            if config.database.backend == Backend::Memory {
                seed::seed(&books)?;
            }
            serve(config, books).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);
    tracing::debug!(config = %cli.config, backend = ?config.database.backend, "Configuration loaded");

    if let Err(e) = run(cli.command.unwrap_or(Command::Serve), config).await {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}
