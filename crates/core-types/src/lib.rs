//! # FX Dashboard Core Types
//!
//! Shared vocabulary for every other crate in the workspace: the canonical
//! trade record, the canonical field names used by the column mapper, and
//! the grouping dimensions understood by the persistence gateway.
//!
//! This crate has no knowledge of files, databases or HTTP.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{BankSide, CanonicalField, GroupBy, Metric};
pub use error::CoreError;
pub use structs::{DashboardLink, TradeRecord, UNKNOWN_BANK};
