//! The catalog's entry point for transport layers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::model::Movie;
use crate::persistence::{MovieRepository, PersistenceError};
use crate::validation::{MovieValidator, ValidationError};

/// Orchestrates validation and storage for movie writes; reads go straight
/// to the repository.
///
/// Holds no state of its own. Every call stands alone against the current
/// database contents, so one service can be shared across request handlers.
pub struct MovieCatalogService<R> {
    repo: Arc<R>,
    validator: MovieValidator<R>,
}

impl<R: MovieRepository> MovieCatalogService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        let validator = MovieValidator::new(repo.clone());
        Self { repo, validator }
    }

    pub fn with_validator(repo: Arc<R>, validator: MovieValidator<R>) -> Self {
        Self { repo, validator }
    }

    /// Validate and store a new movie. A rejected movie never reaches the
    /// store.
    pub async fn create(
        &self,
        movie: &Movie,
        cancel: &CancellationToken,
    ) -> Result<bool, CatalogError> {
        self.validator.validate(movie, cancel).await?;
        self.repo
            .create(movie, cancel)
            .await
            .map_err(|e| lost_slug_race(movie, e))
    }

    pub async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Movie>, CatalogError> {
        Ok(self.repo.get_by_id(id, cancel).await?)
    }

    pub async fn get_by_slug(
        &self,
        slug: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Movie>, CatalogError> {
        Ok(self.repo.get_by_slug(slug, cancel).await?)
    }

    /// Look a movie up by id when `key` parses as a UUID, by slug otherwise.
    pub async fn get_by_id_or_slug(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Movie>, CatalogError> {
        match Uuid::parse_str(key) {
            Ok(id) => self.get_by_id(id, cancel).await,
            Err(_) => self.get_by_slug(key, cancel).await,
        }
    }

    pub async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<Movie>, CatalogError> {
        Ok(self.repo.get_all(cancel).await?)
    }

    /// Validate and fully replace a stored movie.
    ///
    /// Returns `None` without writing when no movie has `movie.id`, and the
    /// movie as now stored otherwise.
    pub async fn update(
        &self,
        movie: Movie,
        cancel: &CancellationToken,
    ) -> Result<Option<Movie>, CatalogError> {
        self.validator.validate(&movie, cancel).await?;

        if !self.repo.exists_by_id(movie.id, cancel).await? {
            tracing::info!(movie_id = %movie.id, "Update rejected, movie not found");
            return Ok(None);
        }

        let updated = self
            .repo
            .update(&movie, cancel)
            .await
            .map_err(|e| lost_slug_race(&movie, e))?;

        // A concurrent delete can land between the probe and the write.
        Ok(updated.then_some(movie))
    }

    pub async fn delete_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<bool, CatalogError> {
        Ok(self.repo.delete_by_id(id, cancel).await?)
    }
}

/// A slug collision that got past the validator reads to the caller the
/// same as one the validator caught.
fn lost_slug_race(movie: &Movie, err: PersistenceError) -> CatalogError {
    if err.is_slug_conflict() {
        tracing::warn!(movie_id = %movie.id, slug = %movie.slug, "Slug claimed concurrently");
        CatalogError::Validation(ValidationError::slug_taken().into())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{Database, SqliteMovieRepository};
    use crate::persistence::ConstraintKind;

    async fn test_service() -> (Database, MovieCatalogService<SqliteMovieRepository>) {
        let db = Database::new_in_memory().await.unwrap();
        let service = MovieCatalogService::new(Arc::new(SqliteMovieRepository::new(db.clone())));
        (db, service)
    }

    async fn movie_count(db: &Database) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
            .fetch_one(db.pool())
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (_db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let movie = Movie::new("Parasite", 2019, ["Thriller", "Drama"]);
        assert!(service.create(&movie, &cancel).await.unwrap());
        assert_eq!(service.get_by_id(movie.id, &cancel).await.unwrap(), Some(movie));
    }

    #[tokio::test]
    async fn test_invalid_create_never_reaches_store() {
        let (db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let movie = Movie::new("", 1999, Vec::<String>::new());

        let err = service.create(&movie, &cancel).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.has_field("title"));
        assert!(errors.has_field("genres"));
        assert_eq!(movie_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_sequential_duplicate_slug_is_validation_error() {
        let (db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let first = Movie::new("Her", 2013, ["Romance"]);
        let second = Movie::new("Her", 2013, ["Drama"]);
        service.create(&first, &cancel).await.unwrap();

        let err = service.create(&second, &cancel).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("slug"));
        assert_eq!(movie_count(&db).await, 1);
    }

    #[test]
    fn test_late_slug_conflict_reported_as_validation() {
        let movie = Movie::new("Nope", 2022, ["Horror"]);
        let err = lost_slug_race(
            &movie,
            PersistenceError::Constraint {
                kind: ConstraintKind::Unique,
                message: "UNIQUE constraint failed: movies.slug".to_string(),
            },
        );
        assert_eq!(
            err.validation_errors().unwrap().iter().next(),
            Some(&ValidationError::slug_taken())
        );

        let other = lost_slug_race(
            &movie,
            PersistenceError::Constraint {
                kind: ConstraintKind::ForeignKey,
                message: "FOREIGN KEY constraint failed".to_string(),
            },
        );
        assert!(matches!(
            other,
            CatalogError::Persistence(PersistenceError::Constraint {
                kind: ConstraintKind::ForeignKey,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_release_year_checked_against_injected_clock() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = Arc::new(SqliteMovieRepository::new(db.clone()));
        let validator = MovieValidator::new(repo.clone()).with_current_year(|| 2030);
        let service = MovieCatalogService::with_validator(repo, validator);
        let cancel = CancellationToken::new();

        let this_year = Movie::new("Next Year's Hit", 2030, ["Drama"]);
        assert!(service.create(&this_year, &cancel).await.unwrap());

        let mut future = Movie::new("Too Soon", 2031, ["Drama"]);
        let err = service.create(&future, &cancel).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("year_of_release"));
        assert_eq!(movie_count(&db).await, 1);

        // The same clock guards updates.
        let mut moved = this_year.clone();
        moved.year_of_release = 2031;
        moved.refresh_slug();
        let err = service.update(moved, &cancel).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("year_of_release"));

        future.year_of_release = 2030;
        future.refresh_slug();
        assert!(service.create(&future, &cancel).await.unwrap());
        assert_eq!(movie_count(&db).await, 2);
    }

    #[tokio::test]
    async fn test_update_returns_stored_movie() {
        let (_db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let mut movie = Movie::new("Tar", 2022, ["Drama", "Music"]);
        service.create(&movie, &cancel).await.unwrap();

        movie.title = "TÁR".to_string();
        movie.genres = ["Drama".to_string()].into_iter().collect();
        let updated = service.update(movie.clone(), &cancel).await.unwrap();
        assert_eq!(updated, Some(movie.clone()));
        assert_eq!(service.get_by_id(movie.id, &cancel).await.unwrap(), Some(movie));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found_without_write() {
        let (db, service) = test_service().await;
        let cancel = CancellationToken::new();
        service
            .create(&Movie::new("Roma", 2018, ["Drama"]), &cancel)
            .await
            .unwrap();
        let before = movie_count(&db).await;

        let ghost = Movie::new("Ghost World", 2001, ["Comedy"]);
        assert_eq!(service.update(ghost.clone(), &cancel).await.unwrap(), None);
        assert_eq!(movie_count(&db).await, before);
        assert_eq!(service.get_by_id(ghost.id, &cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_validates_first() {
        let (_db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let mut movie = Movie::new("Coco", 2017, ["Animation"]);
        service.create(&movie, &cancel).await.unwrap();

        movie.genres.clear();
        let err = service.update(movie.clone(), &cancel).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("genres"));
        let stored = service.get_by_id(movie.id, &cancel).await.unwrap().unwrap();
        assert_eq!(stored.genres.len(), 1);
    }

    #[tokio::test]
    async fn test_update_onto_other_slug_rejected() {
        let (_db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let taken = Movie::new("Cars", 2006, ["Animation"]);
        let mut other = Movie::new("Cars 2", 2011, ["Animation"]);
        service.create(&taken, &cancel).await.unwrap();
        service.create(&other, &cancel).await.unwrap();

        other.slug = taken.slug.clone();
        let err = service.update(other, &cancel).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("slug"));
    }

    #[tokio::test]
    async fn test_get_by_id_or_slug() {
        let (_db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let movie = Movie::new("Sicario", 2015, ["Crime"]);
        service.create(&movie, &cancel).await.unwrap();

        let by_id = service
            .get_by_id_or_slug(&movie.id.to_string(), &cancel)
            .await
            .unwrap();
        let by_slug = service
            .get_by_id_or_slug("sicario-2015", &cancel)
            .await
            .unwrap();
        assert_eq!(by_id, Some(movie.clone()));
        assert_eq!(by_slug, Some(movie));
        assert_eq!(
            service
                .get_by_id_or_slug(&Uuid::new_v4().to_string(), &cancel)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_delete_then_missing() {
        let (_db, service) = test_service().await;
        let cancel = CancellationToken::new();
        let movie = Movie::new("Whiplash", 2014, ["Drama", "Music"]);
        service.create(&movie, &cancel).await.unwrap();

        assert!(service.delete_by_id(movie.id, &cancel).await.unwrap());
        assert!(!service.delete_by_id(movie.id, &cancel).await.unwrap());
        assert!(service.get_all(&cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_call_is_distinct_from_business_failure() {
        let (db, service) = test_service().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service
            .create(&Movie::new("Moon", 2009, ["Sci-Fi"]), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_transient());
        assert_eq!(movie_count(&db).await, 0);
    }
}
