use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend rejected credentials")]
    PermissionDenied,

    #[error("storage operation timed out")]
    Timeout,

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("record not found")]
    NotFound,

    #[error("storage encoding error: {0}")]
    Encoding(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}
