//! # FX Dashboard Analytics
//!
//! Pure calculations over the cleaned trade history: the dashboard views
//! (KPIs, descriptive statistics, bank shares, heatmaps, per-minute series)
//! and the maker allocation optimizer.
//!
//! This crate has no knowledge of the database or HTTP. It depends only on
//! `core-types`; callers load the history and hand it in as a slice.

pub mod allocation;
pub mod dashboard;
pub mod error;
pub mod report;
mod stats;

pub use allocation::{
    baseline_allocation_cost, maker_stats, optimize_allocation, AllocationPlan, AllocationRequest, AllocationRow,
    MakerStats,
};
pub use dashboard::{
    bank_volume_shares, describe, heatmaps, kpis, maker_hour_heatmap, maker_taker_heatmap, minute_series,
    rate_hour_minute_heatmap, top_banks,
};
pub use error::{AllocationError, AnalyticsError};
pub use report::{BankShare, DashboardHeatmaps, Heatmap, Kpi, MetricStats, MinutePoint};
