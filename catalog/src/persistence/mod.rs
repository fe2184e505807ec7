pub mod sqlite;
pub mod traits;

pub use traits::MovieRepository;

/// Which declared invariant a rejected write broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The storage engine rejected a write.
    #[error("constraint violation ({kind:?}): {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    /// No connection could be acquired, or the connection broke.
    #[error("database unavailable: {0}")]
    Connectivity(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("schema provisioning failed: {0}")]
    Schema(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl PersistenceError {
    /// True when the write was rejected by the unique index on `slug`.
    pub fn is_slug_conflict(&self) -> bool {
        matches!(
            self,
            Self::Constraint { kind: ConstraintKind::Unique, message } if message.contains("slug")
        )
    }

    /// Failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        sqlite::helpers::classify(err)
    }
}
