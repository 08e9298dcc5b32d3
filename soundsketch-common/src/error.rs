//! Shared error type
//!
//! Deliberately narrow: the shared crates only ever surface database
//! failures from the result cache, configuration problems, and a
//! catch-all for everything else. Collaborator failures (search, language
//! model) have their own richer type in the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration loading or validation failure
    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}
