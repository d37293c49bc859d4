//! # Trade Store
//!
//! The persistence gateway for cleaned trades and dashboard links.
//!
//! - `connect` / `ensure_schema`: build the `PgPool` and create the tables
//!   on first start.
//! - `TradeStore`: the async gateway trait. `DbRepository` implements it on
//!   PostgreSQL, `InMemoryTradeStore` in process memory.
//! - `AggregateQuery` / `AggregateRow`: grouped reads (sum of amounts, trade
//!   count, min/max/avg rate) by bank, day, hour or minute.
//! - `DbError`: every failure this crate can return.

pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
mod sql;
pub mod store;

pub use connection::{connect, ensure_schema};
pub use error::{DbError, PersistenceError};
pub use memory::InMemoryTradeStore;
pub use repository::DbRepository;
pub use store::{validate_link, AggregateQuery, AggregateRow, DailySummary, GroupKey, TradeStore};
