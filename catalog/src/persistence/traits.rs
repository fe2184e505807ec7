//! Async repository trait for the movie aggregate.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which callers spawning request handlers
//! onto a multi-threaded runtime rely on.
//!
//! Every method takes a [`CancellationToken`]. Once it fires, the operation
//! stops awaiting I/O, drops any open transaction uncommitted and resolves to
//! [`PersistenceError::Cancelled`].

use std::future::Future;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::PersistenceError;
use crate::model::Movie;

/// Storage for movies and their genres.
///
/// Implementations must write the movie row and its genre rows atomically:
/// `create`, `update` and `delete_by_id` each run in exactly one transaction.
/// The `bool` results report whether a row was affected; "absent" is never
/// an error.
pub trait MovieRepository: Send + Sync {
    fn create(
        &self,
        movie: &Movie,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
    fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<Movie>, PersistenceError>> + Send;
    fn get_by_slug(
        &self,
        slug: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<Movie>, PersistenceError>> + Send;
    fn get_all(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Movie>, PersistenceError>> + Send;
    /// Replace slug, title, year and genres. Returns `false` without writing
    /// when no movie with `movie.id` exists; implementations must not rely on
    /// the caller having checked.
    fn update(
        &self,
        movie: &Movie,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
    fn delete_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
    fn exists_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
    fn count(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<u64, PersistenceError>> + Send;
}
