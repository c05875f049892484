/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use certwatch_storage::error::StorageError;
///
/// let err = StorageError::InvalidColumn {
///     column: "expiry_date",
///     value: "not-a-date".to_string(),
/// };
/// assert!(err.to_string().contains("expiry_date"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the data directory failed.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored date or timestamp column could not be parsed back.
    #[error("Storage: invalid value in column '{column}': {value}")]
    InvalidColumn { column: &'static str, value: String },

    /// The backend refused the operation (e.g. a fake store switched off).
    #[error("Storage: unavailable: {0}")]
    Unavailable(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
