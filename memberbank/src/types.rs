//! Common type definitions.
//!
//! - [`MemberId`]: primary key of the `member` table
//! - [`Money`]: member balance, in the smallest currency unit

// Type aliases for IDs
pub type MemberId = String;

/// Balances are whole units. Negative values are not rejected by the schema.
pub type Money = i64;
