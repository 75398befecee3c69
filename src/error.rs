use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParkingError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, ParkingError>;

impl ParkingError {
    /// True for the three kinds a caller can act on by changing its request.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict(_) | Self::NotFound { .. }
        )
    }
}

// Helper conversions
impl From<rusqlite::Error> for ParkingError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}
impl From<::config::ConfigError> for ParkingError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Turns a unique constraint violation into a `Conflict` carrying `message`,
/// anything else into an opaque persistence error.
pub(crate) fn conflict_on_unique(e: rusqlite::Error, message: impl FnOnce() -> String) -> ParkingError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            ParkingError::Conflict(message())
        }
        _ => e.into(),
    }
}
