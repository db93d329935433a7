//! Database record models matching table schemas.
//!
//! Models derive `sqlx::FromRow` so repositories can map query results directly.
//! Create and update requests are separate types so the stored row and the data a
//! caller may supply can evolve independently.
//!
//! - [`members`]: member balances (`member` table)

pub mod members;
