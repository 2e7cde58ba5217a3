use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    #[cfg(feature = "sqlx")]
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    /// A guarded write lost against a concurrent writer, or a storage
    /// uniqueness rule rejected the write.
    #[error("contention: {0}")]
    Contention(String),
    /// Denotes custom application invariant; generally informative.
    #[error("application invariant violated: {0}")]
    AppInvariantViolation(String),
    #[error("unknown error")]
    Unknown,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ValueError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("unsupported value: {0}")]
    Unsupported(String),
    #[error("action key has no step outcome: {0}")]
    UnmappedAction(String),
    #[error("uninitialized value")]
    Uninitialized,
}
