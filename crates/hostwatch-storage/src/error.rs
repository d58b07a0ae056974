/// Errors that can occur within the state store.
///
/// Mutating calls on [`crate::StateStore`] log and swallow persistence
/// failures; these variants surface from [`crate::StateStore::persist_now`]
/// and [`crate::StateStore::set`].
///
/// # Examples
///
/// ```rust
/// use hostwatch_storage::error::StateError;
///
/// let err = StateError::Other("disk full".to_string());
/// assert!(err.to_string().contains("disk full"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Reading, writing or renaming the state file failed.
    #[error("State: I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The document could not be serialized or deserialized.
    #[error("State: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value passed to `set` does not fit the field's schema.
    #[error("State: invalid value for field '{field}': {source}")]
    InvalidField {
        field: String,
        source: serde_json::Error,
    },

    /// Generic state error for cases not covered by other variants.
    #[error("State: {0}")]
    Other(String),
}

/// Convenience `Result` alias for state operations.
pub type Result<T> = std::result::Result<T, StateError>;
