use sqlx::Error as SqlxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RentalError>;

#[derive(Debug, Error)]
pub enum RentalError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Car with id {car_id} is already leased")]
    CarUnavailable { car_id: i64 },

    #[error("Service failure: {0}")]
    ServiceFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RentalError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        RentalError::InvalidArgument(msg.into())
    }

    /// True for errors caused by the caller's input rather than by storage.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RentalError::InvalidArgument(_)
                | RentalError::NotFound { .. }
                | RentalError::Duplicate(_)
                | RentalError::CarUnavailable { .. }
        )
    }
}

/// Unique-constraint violations surface as `Some(message)`.
pub fn unique_violation(err: &SqlxError) -> Option<String> {
    match err {
        SqlxError::Database(db_err) if db_err.is_unique_violation() => {
            Some(db_err.message().to_string())
        }
        _ => None,
    }
}

impl From<RentalError> for std::io::Error {
    fn from(err: RentalError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}
