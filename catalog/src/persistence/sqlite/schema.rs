//! Idempotent schema provisioning.
//!
//! Every step is a single `IF NOT EXISTS` statement executed on its own,
//! outside any transaction, so steps never hold locks for each other and a
//! second process provisioning the same database at the same time only ever
//! sees "already exists" outcomes, which are tolerated.

use super::helpers::is_already_exists;
use super::Database;
use crate::persistence::PersistenceError;

/// One provisioning statement and the name it is logged under.
struct SchemaStep {
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        name: "movies table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS movies (
                id              BLOB    NOT NULL PRIMARY KEY,
                slug            TEXT    NOT NULL,
                title           TEXT    NOT NULL,
                year_of_release INTEGER NOT NULL
            )
            "#,
    },
    // Built as its own statement: an index build never joins a surrounding
    // multi-statement transaction.
    SchemaStep {
        name: "movies slug index",
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS movies_slug_idx ON movies (slug)",
    },
    SchemaStep {
        name: "genres table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS genres (
                movie_id BLOB NOT NULL REFERENCES movies (id),
                name     TEXT NOT NULL
            )
            "#,
    },
    // Also serves per-movie genre lookups (leading column).
    SchemaStep {
        name: "genres movie/name index",
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS genres_movie_name_idx ON genres (movie_id, name)",
    },
];

/// Creates the catalog tables and indexes when they are missing.
pub struct SchemaInitializer {
    db: Database,
}

impl SchemaInitializer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Provision the schema. Safe to call repeatedly and from several
    /// processes at once.
    pub async fn initialize(&self) -> Result<(), PersistenceError> {
        for step in STEPS {
            match sqlx::query(step.sql).execute(self.db.pool()).await {
                Ok(_) => tracing::debug!(step = step.name, "Schema step applied"),
                Err(e) if is_already_exists(&e) => {
                    tracing::debug!(step = step.name, "Schema object created concurrently, skipping");
                }
                Err(e) => {
                    tracing::error!(step = step.name, "Schema step failed: {}", e);
                    return Err(PersistenceError::Schema(format!("{}: {}", step.name, e)));
                }
            }
        }

        tracing::info!(steps = STEPS.len(), "Catalog schema ready");
        Ok(())
    }
}
