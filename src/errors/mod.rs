//! Error handling module for the quizdeck backend.
//!
//! Provides centralized error types with mapping to user-visible response text.

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const INVALID_OWNER: &str = "INVALID_OWNER";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Create called with no owner identity
    InvalidOwner(String),
    /// Resource not found or soft-deleted
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Connection/transport failure to the backing store
    StoreUnavailable(String),
    /// Any other database error
    Database(String),
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidOwner(_) => codes::INVALID_OWNER,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::StoreUnavailable(_) => codes::STORE_UNAVAILABLE,
            AppError::Database(_) => codes::DATABASE_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::InvalidOwner(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::StoreUnavailable(msg) => msg.clone(),
            AppError::Database(msg) => msg.clone(),
        }
    }

    /// Short human-readable text for the chat response. Domain errors carry
    /// their own message; store failures collapse to a generic line so driver
    /// output never reaches the user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidOwner(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::StoreUnavailable(_) | AppError::Database(_) => {
                "something went wrong, please try again later".to_string()
            }
        }
    }

    /// Whether a bounded retry may help (transport-level failures only).
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                AppError::StoreUnavailable(format!("Store unavailable: {}", err))
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}
