//! SQLite-backed persistence for the movie catalog.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers.
//! - **Foreign keys enabled**: genre rows must reference an existing movie.
//! - **Busy timeout**: writers from other connections or processes are
//!   waited on instead of failing immediately.
//!
//! The pool does not provision anything. [`SchemaInitializer`] does, one
//! idempotent statement at a time, at process startup.
//!
//! ## Tables
//!
//! | Table | Key | Notes |
//! |-------|-----|-------|
//! | `movies` | `id` | unique index `movies_slug_idx` on `slug` |
//! | `genres` | none | `movie_id` → `movies.id`; unique on `(movie_id, name)` |
//!
//! [`SqliteMovieRepository`] writes both tables in one transaction per
//! operation and is the only writer.

mod database;
pub(crate) mod helpers;
mod movie_repo;
mod schema;

pub use database::Database;
pub use movie_repo::SqliteMovieRepository;
pub use schema::SchemaInitializer;
