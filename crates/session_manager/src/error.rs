//! Session manager error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Archive not found")]
    NotFound,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("Remote storage error: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
