//! Shared plumbing for the SQLite repositories: driver error classification
//! and cancellation.

use std::future::Future;

use sqlx::error::ErrorKind;
use sqlx::{Sqlite, Transaction};
use tokio_util::sync::CancellationToken;

use crate::persistence::{ConstraintKind, PersistenceError};

// ── error classification ───────────────────────────────────────────────

/// Sort a driver error into the persistence taxonomy.
///
/// SQLite reports constraint failures through extended result codes, which
/// sqlx surfaces as an [`ErrorKind`]. Older builds without extended codes
/// only leave the message, so that is checked as a fallback.
pub fn classify(err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::Database(db_err) => {
            let kind = match db_err.kind() {
                ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                ErrorKind::CheckViolation => Some(ConstraintKind::Check),
                _ => constraint_kind_from_message(db_err.message()),
            };
            match kind {
                Some(kind) => PersistenceError::Constraint {
                    kind,
                    message: db_err.message().to_string(),
                },
                None => PersistenceError::Query(sqlx::Error::Database(db_err)),
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => PersistenceError::Connectivity(err),
        other => PersistenceError::Query(other),
    }
}

fn constraint_kind_from_message(message: &str) -> Option<ConstraintKind> {
    if message.starts_with("UNIQUE constraint failed") {
        Some(ConstraintKind::Unique)
    } else if message.starts_with("FOREIGN KEY constraint failed") {
        Some(ConstraintKind::ForeignKey)
    } else if message.starts_with("NOT NULL constraint failed") {
        Some(ConstraintKind::NotNull)
    } else if message.starts_with("CHECK constraint failed") {
        Some(ConstraintKind::Check)
    } else if message.contains("constraint failed") {
        Some(ConstraintKind::Other)
    } else {
        None
    }
}

/// True for the "object already exists" family of DDL errors that a
/// concurrent provisioner may observe even with `IF NOT EXISTS`.
pub fn is_already_exists(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("already exists"),
        _ => false,
    }
}

// ── cancellation ───────────────────────────────────────────────────────

/// Drive `fut` until it completes or `cancel` fires, whichever is first.
///
/// On cancellation `fut` is dropped at its current await point, so any
/// transaction it holds rolls back and its pooled connection is returned.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, PersistenceError>
where
    F: Future<Output = Result<T, PersistenceError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PersistenceError::Cancelled),
        result = fut => result,
    }
}

/// A write transaction whose statements have all run, waiting for COMMIT.
/// `None` when the write matched nothing and there is nothing to commit.
pub type Staged = Option<Transaction<'static, Sqlite>>;

/// Run a write's statements under `cancel`, then commit them.
///
/// Only the statement phase races the token. It is checked once more right
/// before COMMIT; after that the commit runs to completion and its own
/// outcome is returned. [`PersistenceError::Cancelled`] therefore always
/// means the transaction rolled back.
pub async fn cancellable_write<F>(
    cancel: &CancellationToken,
    statements: F,
) -> Result<bool, PersistenceError>
where
    F: Future<Output = Result<Staged, PersistenceError>>,
{
    let Some(tx) = cancellable(cancel, statements).await? else {
        return Ok(false);
    };
    if cancel.is_cancelled() {
        return Err(PersistenceError::Cancelled);
    }
    tx.commit().await?;
    Ok(true)
}
