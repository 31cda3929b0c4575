use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech error: {0}")]
    Speech(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
