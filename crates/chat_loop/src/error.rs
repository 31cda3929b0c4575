use session_manager::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("session loop has stopped")]
    Closed,

    #[error("Failed to read saved settings: {0}")]
    Settings(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, LoopError>;
