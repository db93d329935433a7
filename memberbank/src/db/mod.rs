//! Database layer for member data.
//!
//! This module implements the data access layer using SQLx with SQLite.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ TransferService  │  (crate::transfer - units of work)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │   Repositories   │  (db::handlers - queries)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │   DataSources    │  (db::datasource, db::pools - connections)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │      SQLite      │
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`datasource`]: The [`datasource::DataSource`] abstraction and the unpooled implementation
//! - [`pools`]: Named connection pool implementing the same abstraction
//! - [`handlers`]: Repository implementations for CRUD operations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories built on a borrowed connection never commit. To run several statements
//! atomically, begin a transaction on the connection and hand the transaction to the
//! repository:
//!
//! ```ignore
//! let mut conn = data_source.get_connection().await?;
//! let mut tx = conn.begin().await?;
//! Members::new(&mut tx).set_money("memberA", 0).await?;
//! tx.commit().await?;
//! conn.release().await;
//! ```
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator.

pub mod datasource;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod pools;
