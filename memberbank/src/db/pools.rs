//! Pooled data source.
//!
//! [`PooledDataSource`] wraps a SQLx connection pool and implements
//! [`DataSource`] by borrowing a connection per call. The pool is built from
//! [`PoolSettings`] and carries a name that shows up in every log line.
//!
//! # Usage
//!
//! `PooledDataSource` implements `Deref<Target = SqlitePool>`, so anything that takes a
//! `&SqlitePool` (migrations, ad-hoc queries) works unchanged:
//!
//! ```ignore
//! let data_source = PooledDataSource::connect("MemberPool", options, &settings).await?;
//! memberbank::migrator().run(&*data_source).await?;
//!
//! let mut conn = data_source.get_connection().await?;
//! ```

use crate::config::PoolSettings;
use crate::db::datasource::{DataSource, DbConnection};
use crate::db::errors::{DbError, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::ops::Deref;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Data source backed by a named connection pool.
#[derive(Clone, Debug)]
pub struct PooledDataSource {
    name: String,
    pool: SqlitePool,
}

impl PooledDataSource {
    /// Wrap an existing pool.
    pub fn new(name: impl Into<String>, pool: SqlitePool) -> Self {
        Self { name: name.into(), pool }
    }

    /// Create a pool from settings and connect it.
    #[instrument(skip(options, settings), fields(max_connections = settings.max_connections), err)]
    pub async fn connect(name: &str, options: SqliteConnectOptions, settings: &PoolSettings) -> Result<Self> {
        let pool = pool_options(settings)
            .connect_with(options)
            .await
            .map_err(|e| DbError::connection(format!("pool {name}"), e))?;

        info!(pool = %name, max_connections = settings.max_connections, "connection pool ready");
        Ok(Self::new(name, pool))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of connections currently open, idle or in use
    pub fn size(&self) -> u32 {
        self.pool.size()
    }

    /// Number of open connections waiting to be handed out
    pub fn num_idle(&self) -> usize {
        self.pool.num_idle()
    }

    /// Close all connections. Later `get_connection` calls fail.
    pub async fn close(&self) {
        self.pool.close().await;
        info!(pool = %self.name, "connection pool closed");
    }
}

/// Dereferences to the underlying pool.
impl Deref for PooledDataSource {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

#[async_trait::async_trait]
impl DataSource for PooledDataSource {
    #[instrument(skip(self), fields(pool = %self.name), err)]
    async fn get_connection(&self) -> Result<DbConnection> {
        let conn = self.pool.acquire().await.map_err(|e| DbError::connection(self.describe(), e))?;
        debug!(size = self.pool.size(), idle = self.pool.num_idle(), "acquired pooled connection");
        Ok(DbConnection::Pooled(conn))
    }

    fn describe(&self) -> String {
        format!("pool {}", self.name)
    }
}

/// Translate pool settings into SQLx pool options. A zero timeout means "never".
fn pool_options(settings: &PoolSettings) -> SqlitePoolOptions {
    let non_zero = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(non_zero(settings.idle_timeout_secs))
        .max_lifetime(non_zero(settings.max_lifetime_secs))
}
