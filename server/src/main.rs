//! Movie catalog server entry point.
//!
//! Reads the database location from the environment (see [`config`]), opens
//! the connection pool, provisions the schema, and then either answers a
//! one-shot query or holds the catalog open until Ctrl-C. An HTTP layer
//! mounts onto [`MovieCatalogService`] in `serve`.

mod config;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use movies_catalog::{
    CatalogError, Database, MovieCatalogService, MovieRepository, PersistenceError,
    SchemaInitializer, SqliteMovieRepository,
};
use tokio_util::sync::CancellationToken;

/// Command-line arguments for the movies server.
#[derive(Parser)]
#[command(name = "movies-server", about = "Movie catalog persistence service")]
struct Cli {
    /// Database connection string. Overrides `MOVIES_DATABASE_URL`.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog schema if it is missing, then exit.
    Init,
    /// Print every movie as JSON.
    List,
    /// Print one movie as JSON.
    Show {
        /// Movie id (UUID) or slug, e.g. `heat-1995`.
        key: String,
    },
    /// Provision the schema and keep the catalog open until Ctrl-C.
    Serve,
}

/// Error type for CLI operations.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// `show` found nothing under the given key.
    #[error("no movie matches '{0}'")]
    NotFound(String),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl From<PersistenceError> for CliError {
    fn from(err: PersistenceError) -> Self {
        Self::Catalog(err.into())
    }
}

/// A token that is cancelled on the first Ctrl-C. In-flight catalog calls
/// observe it and abandon their work.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl-C"),
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
        trigger.cancel();
    });
    token
}

fn write_json<T: serde::Serialize + ?Sized>(
    out: &mut impl Write,
    value: &T,
) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

async fn run(
    command: Commands,
    db: &Database,
    shutdown: &CancellationToken,
    out: &mut impl Write,
) -> Result<(), CliError> {
    SchemaInitializer::new(db.clone()).initialize().await?;

    let repo = Arc::new(SqliteMovieRepository::new(db.clone()));
    let service = MovieCatalogService::new(repo.clone());

    match command {
        Commands::Init => {
            tracing::info!("Catalog schema is ready");
        }
        Commands::List => {
            let movies = service.get_all(shutdown).await?;
            write_json(out, &movies)?;
        }
        Commands::Show { key } => {
            let Some(movie) = service.get_by_id_or_slug(&key, shutdown).await? else {
                return Err(CliError::NotFound(key));
            };
            write_json(out, &movie)?;
        }
        Commands::Serve => {
            let movies = repo.count(shutdown).await?;
            tracing::info!(movies, "Catalog ready, press Ctrl-C to stop");
            shutdown.cancelled().await;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with span durations. Logs go to stderr so JSON on
    // stdout stays clean.
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut db_config = config::load_database_config();
    if let Some(url) = cli.database_url {
        db_config.url = url;
    }

    let db = Database::connect(&db_config)
        .await
        .with_context(|| format!("failed to open catalog database at {}", db_config.url))?;

    let shutdown = shutdown_on_ctrl_c();
    let result = run(cli.command, &db, &shutdown, &mut std::io::stdout()).await;
    db.close().await;

    Ok(result?)
}
