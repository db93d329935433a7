//! Connection providers.
//!
//! A [`DataSource`] hands out one connection per call. Two implementations exist:
//!
//! - [`UnpooledDataSource`]: opens a new physical connection every time and closes it on release
//! - [`PooledDataSource`](crate::db::pools::PooledDataSource): borrows from a sqlx pool and
//!   returns the connection to the pool on release
//!
//! Callers never need to know which one they hold:
//!
//! ```ignore
//! let mut conn = data_source.get_connection().await?;
//! let member = Members::new(&mut conn).find_by_id("memberA").await?;
//! conn.release().await;
//! ```

use crate::db::errors::{DbError, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Sqlite};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use tracing::{debug, instrument, warn};

/// Factory for database connections.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync + std::fmt::Debug {
    /// Obtain a connection. Fails with [`DbError::Connection`] when none can be had.
    async fn get_connection(&self) -> Result<DbConnection>;

    /// Short human readable description used in log lines and errors
    fn describe(&self) -> String;
}

/// A live connection handed out by a [`DataSource`].
///
/// Dereferences to the driver connection so it can be passed straight to a repository.
#[derive(Debug)]
pub enum DbConnection {
    /// Borrowed from a pool, goes back to the pool when released
    Pooled(PoolConnection<Sqlite>),
    /// Dedicated physical connection, closed when released
    Direct(SqliteConnection),
}

impl DbConnection {
    pub fn is_pooled(&self) -> bool {
        matches!(self, DbConnection::Pooled(_))
    }

    /// Give the connection back.
    ///
    /// Dropping has the same effect, but an explicit release lets a direct connection
    /// report close failures.
    pub async fn release(self) {
        match self {
            DbConnection::Pooled(conn) => drop(conn),
            DbConnection::Direct(conn) => {
                if let Err(e) = conn.close().await {
                    warn!(error = %e, "failed to close direct connection");
                }
            }
        }
    }
}

impl Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            DbConnection::Pooled(conn) => &**conn,
            DbConnection::Direct(conn) => conn,
        }
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            DbConnection::Pooled(conn) => &mut **conn,
            DbConnection::Direct(conn) => conn,
        }
    }
}

/// Data source that opens a fresh connection on every call.
///
/// Connection parameters are captured once at construction, so callers only ever ask for
/// a connection.
#[derive(Debug, Clone)]
pub struct UnpooledDataSource {
    options: SqliteConnectOptions,
}

impl UnpooledDataSource {
    pub fn new(options: SqliteConnectOptions) -> Self {
        Self { options }
    }

    /// Build from a `sqlite:` URL with default options.
    pub fn from_url(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url).map_err(|e| DbError::connection(url, e))?;
        Ok(Self::new(options))
    }
}

#[async_trait::async_trait]
impl DataSource for UnpooledDataSource {
    #[instrument(skip(self), err)]
    async fn get_connection(&self) -> Result<DbConnection> {
        let conn = self
            .options
            .connect()
            .await
            .map_err(|e| DbError::connection(self.describe(), e))?;
        debug!(data_source = %self.describe(), "opened new connection");
        Ok(DbConnection::Direct(conn))
    }

    fn describe(&self) -> String {
        format!("unpooled {}", self.options.get_filename().display())
    }
}
