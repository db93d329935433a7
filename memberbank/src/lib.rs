//! # memberbank: member balances with explicit connection and transaction control
//!
//! `memberbank` keeps one integer balance per member in a SQLite table and moves money between
//! members. It is deliberately small: the interesting part is how connections are obtained,
//! shared between statements, and released, and where the transaction boundary of a transfer
//! sits.
//!
//! ## Architecture
//!
//! The **database layer** ([`db`]) has three parts. A [`db::datasource::DataSource`] hands out
//! connections, either a fresh physical connection per call or one borrowed from a named pool
//! ([`db::pools::PooledDataSource`]). Repositories ([`db::handlers`]) run parameterized SQL on a
//! connection: [`db::handlers::Members`] borrows one the caller already holds, while
//! [`db::handlers::MemberRepository`] obtains and releases its own for every call.
//!
//! The **transfer service** ([`transfer`]) runs a debit and a credit on one connection inside one
//! transaction. It commits when both succeed and rolls back otherwise, and always releases the
//! connection. A [`transfer::TransferHook`] between the two steps lets tests inject a failure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use memberbank::{Application, Config, config::Command};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = memberbank::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     memberbank::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.transfers().transfer("memberA", "memberB", 2000).await?;
//!     app.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run on startup unless `run_migrations` is false:
//!
//! ```no_run
//! # use sqlx::SqlitePool;
//! # async fn example(pool: SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
//! memberbank::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod config;
pub mod db;
pub mod errors;
pub mod telemetry;
pub mod transfer;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    config::{Command, DatabaseConfig},
    db::{
        datasource::{DataSource, UnpooledDataSource},
        errors::DbError,
        handlers::{MemberFilter, MemberRepository},
        models::members::Member,
        pools::PooledDataSource,
    },
    errors::Error,
    transfer::{FailAfterDebit, TransferService},
};
pub use config::Config;
use serde::Serialize;
use sqlx::ConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info, instrument};

pub use types::{MemberId, Money};

/// Get the memberbank database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build connect options for a `sqlite:` URL.
///
/// The database file is created if missing, and statements slower than the configured
/// threshold are logged at warn.
fn connect_options(config: &Config) -> Result<SqliteConnectOptions, Error> {
    let url = config.database.url();
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| DbError::connection(url, e))?
        .create_if_missing(true)
        .log_slow_statements(log::LevelFilter::Warn, Duration::from_millis(config.slow_statement_threshold_ms));
    Ok(options)
}

/// Create the data source described by the config and, if asked, migrate the schema.
#[instrument(skip_all, fields(pooled = config.database.is_pooled()))]
async fn setup_database(config: &Config) -> Result<(Arc<dyn DataSource>, Option<PooledDataSource>), Error> {
    let options = connect_options(config)?;

    let (data_source, pool): (Arc<dyn DataSource>, Option<PooledDataSource>) = match &config.database {
        DatabaseConfig::Unpooled { .. } => {
            info!("Using unpooled data source");
            (Arc::new(UnpooledDataSource::new(options)), None)
        }
        DatabaseConfig::Pooled { pool_name, pool, .. } => {
            let pooled = PooledDataSource::connect(pool_name, options, pool).await?;
            (Arc::new(pooled.clone()), Some(pooled))
        }
    };

    if config.run_migrations {
        let mut conn = data_source.get_connection().await?;
        let result = migrator().run(&mut *conn).await;
        conn.release().await;
        result.map_err(anyhow::Error::from)?;
        info!("Database migrations applied");
    }

    Ok((data_source, pool))
}

/// The assembled application: a data source plus the services built on it.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the data source and runs migrations
/// 2. **Use**: [`Application::run`] executes one [`Command`], or use [`Application::members`]
///    and [`Application::transfers`] directly
/// 3. **Shutdown**: [`Application::shutdown`] closes the pool, if there is one
pub struct Application {
    config: Config,
    data_source: Arc<dyn DataSource>,
    pool: Option<PooledDataSource>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> Result<Self, Error> {
        debug!("Starting memberbank with configuration: {:#?}", config);

        let (data_source, pool) = setup_database(&config).await?;

        Ok(Self { config, data_source, pool })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_source(&self) -> Arc<dyn DataSource> {
        self.data_source.clone()
    }

    pub fn members(&self) -> MemberRepository {
        MemberRepository::new(self.data_source.clone())
    }

    pub fn transfers(&self) -> TransferService {
        TransferService::new(self.data_source.clone())
    }

    /// Execute a single command and return its result as JSON
    #[instrument(skip(self), err)]
    pub async fn run(&self, command: Command) -> Result<serde_json::Value, Error> {
        match command {
            Command::Save { member_id, money } => {
                let member = self.members().save(&Member::new(member_id, money)).await?;
                to_json(&member)
            }
            Command::Find { member_id } => match self.members().find_by_id(&member_id).await {
                Ok(member) => to_json(&member),
                Err(DbError::NotFound) => Err(Error::NotFound {
                    resource: "Member".to_string(),
                    id: member_id,
                }),
                Err(e) => Err(e.into()),
            },
            Command::Update { member_id, money } => match self.members().update(&member_id, money).await {
                Ok(()) => to_json(&Member::new(member_id, money)),
                Err(DbError::NotFound) => Err(Error::NotFound {
                    resource: "Member".to_string(),
                    id: member_id,
                }),
                Err(e) => Err(e.into()),
            },
            Command::Delete { member_id } => {
                self.members().delete(&member_id).await?;
                Ok(serde_json::json!({ "deleted": member_id }))
            }
            Command::List { skip, limit } => {
                let members = self.members().list(&MemberFilter::new(skip, limit)).await?;
                to_json(&members)
            }
            Command::Transfer {
                from,
                to,
                amount,
                fail_after_debit,
            } => {
                let service = if fail_after_debit {
                    TransferService::with_hook(self.data_source.clone(), Arc::new(FailAfterDebit::always()))
                } else {
                    self.transfers()
                };
                let receipt = service.transfer(&from, &to, amount).await?;
                to_json(&receipt)
            }
        }
    }

    /// Close database connections
    pub async fn shutdown(self) {
        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, Error> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}
