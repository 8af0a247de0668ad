use thiserror::Error;

/// Error taxonomy for the pipeline (design doc §7). Every stage failure is
/// captured as one of these kinds, logged to the tracking store, and
/// converted into a `failed` status — workers never propagate a bare
/// exception to a sibling.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toolchain error: {0}")]
    Toolchain(String),

    #[error("transient provider error: {0}")]
    TransientProvider(String),

    #[error("permanent provider error: {0}")]
    PermanentProvider(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// True when a caller should retry this error with backoff (§7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::TransientProvider(_))
    }

    /// The process_stage tag an ErrorLogEntry should carry for this error,
    /// when the caller hasn't already picked a more specific stage tag.
    pub fn default_stage(&self) -> &'static str {
        match self {
            PipelineError::Toolchain(_) => "extraction",
            PipelineError::TransientProvider(_) | PipelineError::PermanentProvider(_) => {
                "transcription"
            }
            PipelineError::Validation(_) => "audit",
            _ => "unknown",
        }
    }
}
