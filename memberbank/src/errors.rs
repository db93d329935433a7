use crate::db::errors::DbError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, rejected before any database work
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Business rule failure raised in the middle of a unit of work
    #[error("Business rule violated: {message}")]
    Business { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Process exit code reported by the command line front end.
    ///
    /// Values follow the BSD `sysexits.h` conventions where one fits.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::BadRequest { .. } => 64, // EX_USAGE
            Error::NotFound { .. } => 66,   // EX_NOINPUT
            Error::Business { .. } => 65,   // EX_DATAERR
            Error::Internal { .. } => 70,   // EX_SOFTWARE
            Error::Database(db_err) => match db_err {
                DbError::Connection { .. } => 69, // EX_UNAVAILABLE
                DbError::NotFound => 66,
                DbError::UniqueViolation { .. } => 65,
                DbError::Other(_) => 74, // EX_IOERR
            },
            Error::Other(_) => 70,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Business { message } => format!("Transfer rolled back: {message}"),
            Error::Internal { .. } => "Internal error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::Connection { .. } => "Database is unavailable".to_string(),
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, .. } => match table.as_deref() {
                    Some("member") => "A member with this ID already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal error".to_string(),
        }
    }
}
