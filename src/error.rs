use crate::database::DatabaseError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unauthorized access errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Business logic errors
    #[error("Business logic error: {0}")]
    BusinessLogic(String),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::BusinessLogic(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // unique_violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // foreign_key_violation, check_violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

/// Reasons a coefficient update is declined.
///
/// Every variant means nothing was written: the market value, its previous
/// value and its history are exactly as they were before the attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoefficientError {
    #[error("market {0} not found")]
    MarketNotFound(i64),

    #[error("odds {value:.2} out of bounds [{min:.2}, {max:.2}]")]
    OutOfBounds {
        market_id: i64,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("failed to persist coefficient update: {0}")]
    Persistence(String),
}

impl From<SqlxError> for CoefficientError {
    fn from(err: SqlxError) -> Self {
        CoefficientError::Persistence(err.to_string())
    }
}

impl From<RepositoryError> for CoefficientError {
    fn from(err: RepositoryError) -> Self {
        CoefficientError::Persistence(err.to_string())
    }
}

/// Failures talking to the real-time broker
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to encode publish request: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),
}

impl PublishError {
    /// Whether the broker never answered within the configured timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, PublishError::Transport(e) if e.is_timeout())
    }
}
