use thiserror::Error;

/// Storage-layer errors. The only error class allowed to abort a run.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or create the database.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Schema migration failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Stored value could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
