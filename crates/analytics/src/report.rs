use chrono::NaiveDate;
use core_types::Metric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest value of a metric against the one before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub metric: Metric,
    pub current: Decimal,
    pub previous: Decimal,
    /// `(current - previous) / previous * 100`, or 0 when `previous` is 0.
    pub delta_pct: Decimal,
}

/// Descriptive statistics of one metric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub metric: Metric,
    pub count: usize,
    pub mean: Option<Decimal>,
    pub std: Option<Decimal>, // None below two points
    pub min: Option<Decimal>,
    pub p25: Option<Decimal>,
    pub p50: Option<Decimal>,
    pub p75: Option<Decimal>,
    pub max: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankShare {
    pub bank: String,
    pub volume: Decimal,
    /// Percent of the side's total volume, two decimals.
    pub share_pct: Decimal,
}

/// A dense pivot table. `values[r][c]` belongs to `rows[r]` × `columns[c]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<Decimal>>>,
}

impl Heatmap {
    pub fn get(&self, row: &str, column: &str) -> Option<Decimal> {
        let r = self.rows.iter().position(|x| x == row)?;
        let c = self.columns.iter().position(|x| x == column)?;
        self.values[r][c]
    }
}

/// The three pivot views of the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardHeatmaps {
    pub maker_hour: Heatmap,
    pub maker_taker: Heatmap,
    pub rate_hour_minute: Heatmap,
}

/// Volume and rate range for one `HH:MM` bucket of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutePoint {
    pub trade_date: NaiveDate,
    pub minute: String,
    pub volume: Decimal,
    pub count: usize,
    pub mean_rate: Decimal,
    pub min_rate: Decimal,
    pub max_rate: Decimal,
}
