//! Persistence and consistency core for a movie catalog.
//!
//! A [`Movie`] is stored as one row in `movies` plus one row per genre in
//! `genres`, always written together in a single transaction by
//! [`SqliteMovieRepository`]. [`MovieCatalogService`] is what a transport
//! layer calls: it runs [`MovieValidator`] before every write and delegates
//! reads straight to the repository.
//!
//! ```no_run
//! use std::sync::Arc;
//! use movies_catalog::{
//!     Database, DatabaseConfig, Movie, MovieCatalogService, SchemaInitializer,
//!     SqliteMovieRepository,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect(&DatabaseConfig::default()).await?;
//! SchemaInitializer::new(db.clone()).initialize().await?;
//!
//! let service = MovieCatalogService::new(Arc::new(SqliteMovieRepository::new(db)));
//! let cancel = CancellationToken::new();
//! service.create(&Movie::new("Heat", 1995, ["Crime"]), &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod service;
pub mod validation;

pub use config::DatabaseConfig;
pub use error::CatalogError;
pub use model::{slugify, Movie};
pub use persistence::sqlite::{Database, SchemaInitializer, SqliteMovieRepository};
pub use persistence::{ConstraintKind, MovieRepository, PersistenceError};
pub use service::MovieCatalogService;
pub use validation::{MovieValidator, ValidationError, ValidationErrors};
