use crate::persistence::PersistenceError;
use crate::validation::ValidationErrors;

/// Errors surfaced by [`crate::MovieCatalogService`].
///
/// "Not found" is not an error: reads return `None` and writes return
/// `false`/`None`.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The movie broke one or more business rules. Nothing was written.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl CatalogError {
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Persistence(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Persistence(PersistenceError::Cancelled))
    }

    /// Failures a caller may retry unchanged (connectivity only).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_transient())
    }
}
