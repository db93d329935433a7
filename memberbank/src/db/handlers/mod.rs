//! Repository implementations for database access.
//!
//! # Available Repositories
//!
//! - [`Members`]: member rows, bound to a connection the caller already holds
//! - [`MemberRepository`]: the same operations, each on its own connection from a
//!   [`DataSource`](crate::db::datasource::DataSource)
//!
//! # Common Pattern
//!
//! ```ignore
//! use memberbank::db::handlers::{Members, Repository};
//!
//! let mut conn = data_source.get_connection().await?;
//! let members = Members::new(&mut conn).list(&MemberFilter::default()).await?;
//! conn.release().await;
//! ```
//!
//! # The Repository Trait
//!
//! The [`Repository`] trait defines the CRUD operations a connection-bound repository
//! implements:
//!
//! - `create()`: Insert a new record
//! - `get_by_id()`: Fetch a record by ID
//! - `list()`: List records with pagination
//! - `update()`: Change a record by ID
//! - `delete()`: Delete a record by ID

pub mod member_repository;
pub mod members;
pub mod repository;

pub use member_repository::MemberRepository;
pub use members::{MemberFilter, Members};
pub use repository::Repository;
