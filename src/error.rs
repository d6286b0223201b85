//! Error types for the core library
//!
//! Reference resolution failures are not errors (they yield `None`); this
//! enum covers the conditions that must reach the caller: reference
//! construction that cannot succeed, edits that cannot be applied, and
//! filesystem failures during `change`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A relative path cannot be substituted into a URL that carries a
    /// scheme or host; the surrounding reference would be meaningless.
    #[error("cannot embed relative path '{}' into a URL with scheme or host '{url}'", path.display())]
    RelativePathInUrl { path: PathBuf, url: String },

    /// Rewriting a single reference failed. Carries the (file, reference)
    /// pair so the caller can report which link broke the plan.
    #[error("cannot rewrite reference '{reference}' in '{}'", file.display())]
    RefRewrite {
        file: PathBuf,
        reference: String,
        #[source]
        source: Box<Error>,
    },

    /// A content edit could not be applied to the target file.
    #[error("cannot apply edit to '{}': {reason}", path.display())]
    Edit { path: PathBuf, reason: String },

    /// A query string could not be parsed.
    #[error("invalid query: {0}")]
    Query(String),

    /// A configured filter or skip pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An edit-log entry could not be serialized.
    #[error("cannot serialize edit log entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap an error with the (file, reference) pair it occurred on.
    pub fn in_reference(self, file: &PathBuf, reference: &str) -> Self {
        Error::RefRewrite {
            file: file.clone(),
            reference: reference.to_string(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
