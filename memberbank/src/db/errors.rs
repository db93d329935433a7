use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// A connection could not be obtained from the data source
    #[error("Failed to obtain a database connection from {source_name}")]
    Connection {
        source_name: String,
        #[source]
        source: sqlx::Error,
    },

    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Catch-all for statement failures that the caller cannot act on
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Wrap a driver error raised while acquiring a connection.
    pub fn connection(source_name: impl Into<String>, source: sqlx::Error) -> Self {
        DbError::Connection {
            source_name: source_name.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound)
    }
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::UniqueViolation {
                constraint: db_err.constraint().map(|s| s.to_string()),
                table: db_err
                    .table()
                    .map(|s| s.to_string())
                    .or_else(|| table_from_message(db_err.message())),
                message: db_err.message().to_string(),
            },
            // Everything else (other constraint kinds, lost connections, decode failures) is a
            // plain data access failure
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// SQLite reports no table for constraint errors, only a message such as
/// `UNIQUE constraint failed: member.member_id`.
fn table_from_message(message: &str) -> Option<String> {
    let columns = message.split_once("constraint failed: ")?.1;
    let (table, _column) = columns.split(", ").next()?.split_once('.')?;
    Some(table.to_string())
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
