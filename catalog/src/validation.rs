//! Business rules checked before any write reaches the store.
//!
//! All rules run and every failure is reported, so a caller can fix the
//! whole input in one go. The slug rule reads the store and is only an early
//! rejection: two concurrent writers can both pass it, and the unique index
//! on `movies.slug` is what actually keeps slugs unique.

use std::fmt;
use std::sync::Arc;

use chrono::Datelike;
use tokio_util::sync::CancellationToken;

use crate::error::CatalogError;
use crate::model::Movie;
use crate::persistence::MovieRepository;

/// Reported when another movie already owns the slug.
pub const SLUG_TAKEN: &str = "This movie already exists in the system.";

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub fn slug_taken() -> Self {
        Self::new("slug", SLUG_TAKEN)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every rule a movie failed, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// True if any failure concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

fn current_utc_year() -> i32 {
    chrono::Utc::now().year()
}

/// Field-level rules that need nothing but the movie itself.
fn check_fields(movie: &Movie, current_year: i32) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if movie.id.is_nil() {
        errors.push(ValidationError::new("id", "must not be empty"));
    }
    if movie.genres.is_empty() {
        errors.push(ValidationError::new("genres", "must not be empty"));
    } else if movie.genres.iter().any(|g| g.trim().is_empty()) {
        errors.push(ValidationError::new("genres", "genre names must not be blank"));
    }
    if movie.title.trim().is_empty() {
        errors.push(ValidationError::new("title", "must not be empty"));
    }
    if movie.slug.trim().is_empty() {
        errors.push(ValidationError::new("slug", "must not be empty"));
    }
    if movie.year_of_release > current_year {
        errors.push(ValidationError::new(
            "year_of_release",
            format!("must be less than or equal to {current_year}"),
        ));
    }

    errors
}

/// Validates movies against field rules and slug ownership.
pub struct MovieValidator<R> {
    repo: Arc<R>,
    current_year: fn() -> i32,
}

impl<R: MovieRepository> MovieValidator<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            current_year: current_utc_year,
        }
    }

    /// Override the clock used for the release-year rule.
    pub fn with_current_year(mut self, current_year: fn() -> i32) -> Self {
        self.current_year = current_year;
        self
    }

    /// Check `movie`. Storage failures during the slug lookup propagate as
    /// [`CatalogError::Persistence`], not as validation failures.
    pub async fn validate(
        &self,
        movie: &Movie,
        cancel: &CancellationToken,
    ) -> Result<(), CatalogError> {
        let mut errors = check_fields(movie, (self.current_year)());

        if !movie.slug.trim().is_empty() && self.slug_taken(movie, cancel).await? {
            errors.push(ValidationError::slug_taken());
        }

        if errors.is_empty() {
            return Ok(());
        }

        tracing::warn!(
            movie_id = %movie.id,
            failures = errors.len(),
            "Movie rejected: {}",
            errors
        );
        Err(CatalogError::Validation(errors))
    }

    /// The slug belongs to a movie with a different id. Re-validating a
    /// movie against its own stored row passes.
    async fn slug_taken(
        &self,
        movie: &Movie,
        cancel: &CancellationToken,
    ) -> Result<bool, CatalogError> {
        let existing = self.repo.get_by_slug(&movie.slug, cancel).await?;
        Ok(existing.is_some_and(|other| other.id != movie.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{Database, SqliteMovieRepository};
    use uuid::Uuid;

    async fn test_validator() -> (
        Arc<SqliteMovieRepository>,
        MovieValidator<SqliteMovieRepository>,
    ) {
        let db = Database::new_in_memory().await.unwrap();
        let repo = Arc::new(SqliteMovieRepository::new(db));
        let validator = MovieValidator::new(repo.clone()).with_current_year(|| 2024);
        (repo, validator)
    }

    fn valid_movie() -> Movie {
        Movie::new("Oppenheimer", 2023, ["Drama", "History"])
    }

    #[test]
    fn test_valid_movie_has_no_field_errors() {
        assert!(check_fields(&valid_movie(), 2024).is_empty());
    }

    #[test]
    fn test_release_year_boundary() {
        let mut movie = valid_movie();
        movie.year_of_release = 2024;
        assert!(check_fields(&movie, 2024).is_empty());
        movie.year_of_release = 2025;
        let errors = check_fields(&movie, 2024);
        assert_eq!(errors.len(), 1);
        assert!(errors.has_field("year_of_release"));
    }

    #[test]
    fn test_collects_every_failure() {
        let movie = Movie {
            id: Uuid::nil(),
            slug: " ".to_string(),
            title: String::new(),
            year_of_release: 3000,
            genres: Default::default(),
        };
        let errors = check_fields(&movie, 2024);
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["id", "genres", "title", "slug", "year_of_release"]);
    }

    #[test]
    fn test_blank_genre_name_rejected() {
        let mut movie = valid_movie();
        movie.genres.insert("  ".to_string());
        assert!(check_fields(&movie, 2024).has_field("genres"));
    }

    #[test]
    fn test_display_joins_failures() {
        let mut errors = ValidationErrors::from(ValidationError::new("title", "must not be empty"));
        errors.push(ValidationError::slug_taken());
        assert_eq!(
            errors.to_string(),
            "title: must not be empty; slug: This movie already exists in the system."
        );
    }

    #[tokio::test]
    async fn test_free_slug_passes() {
        let (_repo, validator) = test_validator().await;
        let cancel = CancellationToken::new();
        validator.validate(&valid_movie(), &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_slug_owned_by_other_movie_fails() {
        let (repo, validator) = test_validator().await;
        let cancel = CancellationToken::new();
        let existing = valid_movie();
        repo.create(&existing, &cancel).await.unwrap();

        let mut clash = valid_movie();
        clash.id = Uuid::new_v4();
        let err = validator.validate(&clash, &cancel).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.iter().next().unwrap(), &ValidationError::slug_taken());
    }

    #[tokio::test]
    async fn test_own_slug_passes_on_revalidation() {
        let (repo, validator) = test_validator().await;
        let cancel = CancellationToken::new();
        let mut movie = valid_movie();
        repo.create(&movie, &cancel).await.unwrap();

        movie.title = "Oppenheimer (IMAX)".to_string();
        validator.validate(&movie, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_field_and_slug_failures_reported_together() {
        let (repo, validator) = test_validator().await;
        let cancel = CancellationToken::new();
        let existing = valid_movie();
        repo.create(&existing, &cancel).await.unwrap();

        let mut bad = valid_movie();
        bad.id = Uuid::new_v4();
        bad.title = String::new();
        bad.year_of_release = 2030;
        let err = validator.validate(&bad, &cancel).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has_field("title"));
        assert!(errors.has_field("year_of_release"));
        assert!(errors.has_field("slug"));
    }

    #[tokio::test]
    async fn test_cancelled_lookup_is_not_a_validation_failure() {
        let (_repo, validator) = test_validator().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = validator.validate(&valid_movie(), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.validation_errors().is_none());
    }
}
