//! SQLite-backed repository for movies and their genres.

use std::collections::BTreeSet;

use sqlx::SqliteConnection;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::helpers::{cancellable, cancellable_write, Staged};
use super::Database;
use crate::model::Movie;
use crate::persistence::traits::MovieRepository;
use crate::persistence::PersistenceError;

/// Row type for movie queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct MovieRow {
    id: Uuid,
    slug: String,
    title: String,
    year_of_release: i32,
}

impl MovieRow {
    fn into_movie(self, genres: BTreeSet<String>) -> Movie {
        Movie {
            id: self.id,
            slug: self.slug,
            title: self.title,
            year_of_release: self.year_of_release,
            genres,
        }
    }
}

/// One row of the movies ⟕ genres join: a movie repeated once per genre,
/// or once with no genre.
#[derive(sqlx::FromRow)]
struct MovieGenreRow {
    id: Uuid,
    slug: String,
    title: String,
    year_of_release: i32,
    genre: Option<String>,
}

/// SQLite implementation of [`MovieRepository`].
pub struct SqliteMovieRepository {
    db: Database,
}

impl SqliteMovieRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn insert_aggregate(&self, movie: &Movie) -> Result<Staged, PersistenceError> {
        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO movies (id, slug, title, year_of_release)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(movie.id)
        .bind(&movie.slug)
        .bind(&movie.title)
        .bind(movie.year_of_release)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tracing::warn!(movie_id = %movie.id, "Movie insert affected no rows");
            return Ok(None);
        }

        insert_genres(&mut tx, movie.id, &movie.genres).await?;
        Ok(Some(tx))
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<Movie>, PersistenceError> {
        let mut conn = self.db.acquire().await?;
        let row: Option<MovieRow> = sqlx::query_as(
            r#"
            SELECT id, slug, title, year_of_release
            FROM movies
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        tracing::debug!(movie_id = %id, found = row.is_some(), "Loaded movie by id");
        attach_genres(&mut conn, row).await
    }

    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Movie>, PersistenceError> {
        let mut conn = self.db.acquire().await?;
        let row: Option<MovieRow> = sqlx::query_as(
            r#"
            SELECT id, slug, title, year_of_release
            FROM movies
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?;

        tracing::debug!(slug = %slug, found = row.is_some(), "Loaded movie by slug");
        attach_genres(&mut conn, row).await
    }

    async fn fetch_all(&self) -> Result<Vec<Movie>, PersistenceError> {
        let rows: Vec<MovieGenreRow> = sqlx::query_as(
            r#"
            SELECT m.id, m.slug, m.title, m.year_of_release, g.name AS genre
            FROM movies m
            LEFT JOIN genres g ON g.movie_id = m.id
            ORDER BY m.id, g.name
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let movies = regroup(rows);
        tracing::debug!(count = movies.len(), "Loaded all movies");
        Ok(movies)
    }

    async fn replace_aggregate(&self, movie: &Movie) -> Result<Staged, PersistenceError> {
        let mut tx = self.db.begin().await?;

        // Write before reading anything, so the transaction takes the write
        // lock up front instead of upgrading a stale read snapshot.
        let updated = sqlx::query(
            r#"
            UPDATE movies
            SET slug = ?, title = ?, year_of_release = ?
            WHERE id = ?
            "#,
        )
        .bind(&movie.slug)
        .bind(&movie.title)
        .bind(movie.year_of_release)
        .bind(movie.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tracing::debug!(movie_id = %movie.id, "Update target missing");
            return Ok(None);
        }

        sqlx::query("DELETE FROM genres WHERE movie_id = ?")
            .bind(movie.id)
            .execute(&mut *tx)
            .await?;

        insert_genres(&mut tx, movie.id, &movie.genres).await?;
        Ok(Some(tx))
    }

    async fn remove_aggregate(&self, id: Uuid) -> Result<Staged, PersistenceError> {
        let mut tx = self.db.begin().await?;

        // Genres first: they reference the movie row.
        sqlx::query("DELETE FROM genres WHERE movie_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // No movie row means no genre rows either (foreign key).
        Ok((deleted > 0).then_some(tx))
    }

    async fn probe_exists(&self, id: Uuid) -> Result<bool, PersistenceError> {
        let mut conn = self.db.acquire().await?;
        movie_exists(&mut conn, id).await
    }

    async fn count_rows(&self) -> Result<u64, PersistenceError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.0 as u64)
    }
}

impl MovieRepository for SqliteMovieRepository {
    async fn create(
        &self,
        movie: &Movie,
        cancel: &CancellationToken,
    ) -> Result<bool, PersistenceError> {
        let created = cancellable_write(cancel, self.insert_aggregate(movie)).await?;
        if created {
            tracing::info!(
                movie_id = %movie.id,
                slug = %movie.slug,
                genres = movie.genres.len(),
                "Movie created"
            );
        }
        Ok(created)
    }

    async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Movie>, PersistenceError> {
        cancellable(cancel, self.fetch_by_id(id)).await
    }

    async fn get_by_slug(
        &self,
        slug: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Movie>, PersistenceError> {
        cancellable(cancel, self.fetch_by_slug(slug)).await
    }

    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<Movie>, PersistenceError> {
        cancellable(cancel, self.fetch_all()).await
    }

    async fn update(
        &self,
        movie: &Movie,
        cancel: &CancellationToken,
    ) -> Result<bool, PersistenceError> {
        let updated = cancellable_write(cancel, self.replace_aggregate(movie)).await?;
        if updated {
            tracing::info!(
                movie_id = %movie.id,
                slug = %movie.slug,
                genres = movie.genres.len(),
                "Movie updated"
            );
        }
        Ok(updated)
    }

    async fn delete_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<bool, PersistenceError> {
        let deleted = cancellable_write(cancel, self.remove_aggregate(id)).await?;
        if deleted {
            tracing::info!(movie_id = %id, "Movie deleted");
        }
        Ok(deleted)
    }

    async fn exists_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<bool, PersistenceError> {
        cancellable(cancel, self.probe_exists(id)).await
    }

    async fn count(&self, cancel: &CancellationToken) -> Result<u64, PersistenceError> {
        cancellable(cancel, self.count_rows()).await
    }
}

/// Insert one genre row per name. Runs on the caller's transaction.
async fn insert_genres(
    conn: &mut SqliteConnection,
    movie_id: Uuid,
    genres: &BTreeSet<String>,
) -> Result<(), PersistenceError> {
    for name in genres {
        sqlx::query("INSERT INTO genres (movie_id, name) VALUES (?, ?)")
            .bind(movie_id)
            .bind(name)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Load all genre names for a movie, alphabetically.
async fn load_genres(
    conn: &mut SqliteConnection,
    movie_id: Uuid,
) -> Result<BTreeSet<String>, PersistenceError> {
    let names: Vec<String> =
        sqlx::query_scalar("SELECT name FROM genres WHERE movie_id = ? ORDER BY name")
            .bind(movie_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(names.into_iter().collect())
}

/// Second half of a single-movie read: fetch the children and attach them.
async fn attach_genres(
    conn: &mut SqliteConnection,
    row: Option<MovieRow>,
) -> Result<Option<Movie>, PersistenceError> {
    match row {
        None => Ok(None),
        Some(r) => {
            let genres = load_genres(conn, r.id).await?;
            Ok(Some(r.into_movie(genres)))
        }
    }
}

async fn movie_exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, PersistenceError> {
    let found: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movies WHERE id = ?)")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(found != 0)
}

/// Fold the flattened join back into aggregates. Rows must arrive grouped
/// by movie id.
fn regroup(rows: Vec<MovieGenreRow>) -> Vec<Movie> {
    let mut movies: Vec<Movie> = Vec::new();
    for row in rows {
        match movies.last_mut() {
            Some(last) if last.id == row.id => {
                if let Some(genre) = row.genre {
                    last.genres.insert(genre);
                }
            }
            _ => movies.push(Movie {
                id: row.id,
                slug: row.slug,
                title: row.title,
                year_of_release: row.year_of_release,
                genres: row.genre.into_iter().collect(),
            }),
        }
    }
    movies
}
