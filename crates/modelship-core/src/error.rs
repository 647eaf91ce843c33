//! Error types for modelship.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    /// The remote API answered with something we cannot interpret.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The remote API answered with an error document.
    #[error("Remote error {code}: {message}")]
    Remote { code: String, message: String },
}

impl Error {
    /// Returns true if the remote side rejected the request.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
