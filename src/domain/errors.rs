use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Invalid format: {0}")]
    FormatInvalid(String),
    #[error("Unreachable: {0}")]
    Unreachable(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if message.contains("UNIQUE") || message.contains("unique") {
                    DomainError::Conflict(message.to_string())
                } else {
                    DomainError::Internal(format!("Database error: {}", message))
                }
            }
            sqlx::Error::PoolTimedOut => {
                DomainError::Timeout("Timed out acquiring a database connection".to_string())
            }
            sqlx::Error::Io(e) => DomainError::Unreachable(format!("Database I/O error: {}", e)),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                DomainError::Unreachable("Database pool is not available".to_string())
            }
            other => DomainError::Internal(format!("Database error: {}", other)),
        }
    }
}
