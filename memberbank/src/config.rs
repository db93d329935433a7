//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `MEMBERBANK_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `MEMBERBANK_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `MEMBERBANK_DATABASE__POOL__MAX_CONNECTIONS=4` sets the `database.pool.max_connections` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use memberbank::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Using database {}", config.database.url());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! See the repository's `config.yaml` for a complete example. Key sections include:
//!
//! - **Database**: `database.type` (`pooled` or `unpooled`), `database.url`, and for pooled
//!   sources `database.pool_name` and `database.pool`
//! - **Logging**: `slow_statement_threshold_ms` - statements slower than this are logged at warn
//! - **Schema**: `run_migrations` - apply the bundled migrations on startup
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Set database connection (preferred method)
//! DATABASE_URL="sqlite://memberbank.db"
//!
//! # Or use MEMBERBANK_DATABASE__URL
//! MEMBERBANK_DATABASE__URL="sqlite://memberbank.db"
//!
//! # Override nested values
//! MEMBERBANK_DATABASE__POOL__MAX_CONNECTIONS=4
//! MEMBERBANK_RUN_MIGRATIONS=false
//! ```

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::Money;

/// CLI args: the config file plus the operation to run
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "MEMBERBANK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without touching the database.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operations exposed on the command line. Results are printed as JSON.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert a new member
    Save { member_id: String, money: Money },
    /// Look up a member by ID
    Find { member_id: String },
    /// Replace a member's balance
    Update { member_id: String, money: Money },
    /// Delete a member (succeeds if the member does not exist)
    Delete { member_id: String },
    /// List members ordered by ID
    List {
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Move money between two members in one transaction
    Transfer {
        from: String,
        to: String,
        amount: Money,
        /// Fail after the debit step so the transaction is rolled back
        #[arg(long)]
        fail_after_debit: bool,
    },
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Set from `DATABASE_URL`; folded into `database` by [`Config::load`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Where connections come from
    pub database: DatabaseConfig,
    /// Threshold in milliseconds for logging slow SQL statements (default: 1000ms)
    pub slow_statement_threshold_ms: u64,
    /// Apply the bundled schema migrations on startup
    pub run_migrations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database: DatabaseConfig::default(),
            slow_statement_threshold_ms: 1000,
            run_migrations: true,
        }
    }
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

fn default_pool_name() -> String {
    "MemberPool".to_string()
}

/// Database configuration.
///
/// Either a fresh connection per request (`unpooled`) or a named connection pool (`pooled`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// Open a new physical connection on every request
    Unpooled {
        /// SQLite connection URL
        url: String,
    },
    /// Borrow connections from a pool
    Pooled {
        /// SQLite connection URL
        url: String,
        /// Name shown in log lines for this pool
        #[serde(default = "default_pool_name")]
        pool_name: String,
        #[serde(default)]
        pool: PoolSettings,
    },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::Pooled {
            url: "sqlite://memberbank.db".to_string(),
            pool_name: default_pool_name(),
            pool: PoolSettings::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> &str {
        match self {
            DatabaseConfig::Unpooled { url } | DatabaseConfig::Pooled { url, .. } => url,
        }
    }

    /// Replace the URL, keeping the data source kind and pool settings
    pub fn set_url(&mut self, new_url: String) {
        match self {
            DatabaseConfig::Unpooled { url } | DatabaseConfig::Pooled { url, .. } => *url = new_url,
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, DatabaseConfig::Pooled { .. })
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving the data source kind and pool settings)
        if let Some(url) = config.database_url.take() {
            config.database.set_url(url);
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let url = self.database.url();
        if url.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: database.url cannot be empty".to_string(),
            });
        }

        if !url.starts_with("sqlite:") {
            return Err(Error::Internal {
                operation: format!("Config validation: database.url must use the sqlite: scheme, got '{url}'"),
            });
        }

        if let DatabaseConfig::Pooled { pool_name, pool, .. } = &self.database {
            if pool_name.trim().is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: database.pool_name cannot be empty".to_string(),
                });
            }

            if pool.max_connections < 1 {
                return Err(Error::Internal {
                    operation: "Config validation: database.pool.max_connections must be at least 1".to_string(),
                });
            }

            if pool.min_connections > pool.max_connections {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                        pool.min_connections, pool.max_connections
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // MEMBERBANK_CONFIG names the file itself and is not a config key
            .merge(Env::prefixed("MEMBERBANK_").ignore(&["config"]).split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }
}
