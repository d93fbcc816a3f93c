//! Error types surfaced by the prime search

use thiserror::Error;

/// Errors produced while generating or testing candidates.
#[derive(Debug, Error)]
pub enum Error {
    /// A byte length, count or sampling range the core cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The secure randomness source could not supply bytes. Never retried.
    #[error("secure randomness unavailable: {0}")]
    RandomnessUnavailable(#[from] rand::Error),
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidInput(reason.into())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
