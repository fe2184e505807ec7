//! Catalog domain types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A movie aggregate: the movie row plus its genre rows.
///
/// `genres` is a set, so duplicate genre names collapse before they ever
/// reach the store and read-back order is alphabetical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub year_of_release: i32,
    pub genres: BTreeSet<String>,
}

impl Movie {
    /// Build a new movie with a freshly assigned id and a slug derived from
    /// the title and release year.
    pub fn new<I, S>(title: impl Into<String>, year_of_release: i32, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let title = title.into();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&title, year_of_release),
            title,
            year_of_release,
            genres: genres.into_iter().map(Into::into).collect(),
        }
    }

    /// Recompute the slug after the title or year changed.
    pub fn refresh_slug(&mut self) {
        self.slug = slugify(&self.title, self.year_of_release);
    }
}

/// Derive a URL-safe slug: lowercase, characters outside `[0-9a-z _-]`
/// dropped, spaces turned into `-`, and the release year appended.
///
/// ```
/// use movies_catalog::slugify;
/// assert_eq!(slugify("Nick the Greek", 2023), "nick-the-greek-2023");
/// ```
pub fn slugify(title: &str, year_of_release: i32) -> String {
    let base: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .map(|c| match c {
            ' ' => '-',
            other => other.to_ascii_lowercase(),
        })
        .collect();
    format!("{base}-{year_of_release}")
}
