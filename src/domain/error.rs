use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Authentication failed")]
    AuthFailure,

    #[error("Expected page structure missing: {0}")]
    ExtractionGap(String),

    #[error("Lecture could not be resolved: {0}")]
    ResolutionFailure(String),

    #[error("Transfer failed: {0}")]
    TransferFailure(String),

    #[error("Batch cancelled")]
    BatchInterrupted,

    #[error("Batch gave up after {attempts} attempts: {last_error}")]
    BatchExhausted { attempts: u32, last_error: String },

    #[error("No course selected")]
    NoCourseSelected,

    #[error("No destination folder selected")]
    NoDestination,

    #[error("Unknown course: {0}")]
    CourseNotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<crate::api::ApiError> for AppError {
    fn from(e: crate::api::ApiError) -> Self {
        AppError::Api(e.to_string())
    }
}
