/// Errors from value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error reported by SQLite.
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be parsed.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// An id does not fit the backend's integer column.
    #[error("id {0} is out of range for this store")]
    IdOutOfRange(u64),

    /// A traversal-stack position that should hold a frame is empty.
    #[error("traversal stack has no frame at position {0}")]
    MissingStackFrame(u64),

    /// `commit` or `rollback` without a matching `begin`.
    #[error("no transaction is open")]
    NoTransaction,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
