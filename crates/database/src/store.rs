use crate::error::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DashboardLink, GroupBy, TradeRecord};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A grouped read over the trades table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub group_by: GroupBy,
    /// Inclusive lower bound on `trade_date`.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `trade_date`.
    pub to: Option<NaiveDate>,
}

impl AggregateQuery {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            from: None,
            to: None,
        }
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn matches(&self, record: &TradeRecord) -> bool {
        self.from.is_none_or(|from| record.trade_date >= from)
            && self.to.is_none_or(|to| record.trade_date <= to)
    }
}

/// The grouping key of one aggregate row. Only the parts that belong to the
/// query's `GroupBy` are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maker_bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taker_bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<u8>,
}

impl GroupKey {
    /// Projects a record onto the key parts of `group_by`.
    pub fn of(record: &TradeRecord, group_by: GroupBy) -> Self {
        let mut key = GroupKey::default();
        match group_by {
            GroupBy::MakerBank => key.maker_bank = Some(record.maker_bank.clone()),
            GroupBy::TakerBank => key.taker_bank = Some(record.taker_bank.clone()),
            GroupBy::TradeDate => key.trade_date = Some(record.trade_date),
            GroupBy::Hour => key.hour = Some(record.hour),
            GroupBy::HourMinute => {
                key.hour = Some(record.hour);
                key.minute = Some(record.minute);
            }
            GroupBy::DateMinute => {
                key.trade_date = Some(record.trade_date);
                key.hour = Some(record.hour);
                key.minute = Some(record.minute);
            }
            GroupBy::MakerTaker => {
                key.maker_bank = Some(record.maker_bank.clone());
                key.taker_bank = Some(record.taker_bank.clone());
            }
            GroupBy::MakerHour => {
                key.maker_bank = Some(record.maker_bank.clone());
                key.hour = Some(record.hour);
            }
        }
        key
    }

    /// A display label such as `"ACME BANK"`, `"2024-01-05 09:30"` or `"BNP → ACME"`.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(date) = self.trade_date {
            parts.push(date.to_string());
        }
        match (&self.maker_bank, &self.taker_bank) {
            (Some(maker), Some(taker)) => parts.push(format!("{maker} → {taker}")),
            (Some(bank), None) | (None, Some(bank)) => parts.push(bank.clone()),
            (None, None) => {}
        }
        match (self.hour, self.minute) {
            (Some(h), Some(m)) => parts.push(format!("{h:02}:{m:02}")),
            (Some(h), None) => parts.push(format!("{h:02}h")),
            _ => {}
        }
        parts.join(" ")
    }
}

/// Sums, counts and rate extremes for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub total_amount: Decimal,
    pub trade_count: i64,
    pub min_rate: Decimal,
    pub max_rate: Decimal,
    pub avg_rate: Decimal,
}

/// Fractional digits reported for `avg_rate` by every store.
pub const AVG_RATE_SCALE: u32 = 16;

/// Rounds a mean rate to `AVG_RATE_SCALE` digits, half away from zero as
/// PostgreSQL's `ROUND` does, without trailing zeros.
pub fn round_avg_rate(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(AVG_RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// One line of the per-day history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailySummary {
    pub trade_date: NaiveDate,
    pub transactions: i64,
    pub volume_total: Decimal,
    pub nb_makers: i64,
    pub nb_takers: i64,
}

/// The persistence gateway.
///
/// Implementations must agree on aggregate semantics and row ordering, so
/// the in-memory store can stand in for PostgreSQL in tests.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Appends clean records atomically. Returns the number of rows written.
    async fn insert(&self, records: &[TradeRecord]) -> Result<u64, DbError>;

    /// Removes every trade. Calling it on an empty table is not an error.
    async fn truncate(&self) -> Result<(), DbError>;

    async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>, DbError>;

    /// Per-day totals, newest day first.
    async fn daily_summary(&self) -> Result<Vec<DailySummary>, DbError>;

    /// Every trade, in chronological order.
    async fn load_all(&self) -> Result<Vec<TradeRecord>, DbError>;

    async fn count(&self) -> Result<i64, DbError>;

    async fn add_link(&self, name: &str, url: &str) -> Result<DashboardLink, DbError>;

    /// Stored links, newest first.
    async fn list_links(&self) -> Result<Vec<DashboardLink>, DbError>;

    /// Deletes a link; `DbError::NotFound` when the id does not exist.
    async fn delete_link(&self, id: i32) -> Result<(), DbError>;
}

/// Trims and checks a link before it is stored.
pub fn validate_link(name: &str, raw_url: &str) -> Result<(String, String), DbError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DbError::InvalidLink("name must not be empty".to_string()));
    }
    let raw_url = raw_url.trim();
    let parsed = url::Url::parse(raw_url).map_err(|e| DbError::InvalidLink(format!("'{raw_url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
        return Err(DbError::InvalidLink(format!(
            "'{raw_url}' must be an http:// or https:// address"
        )));
    }
    Ok((name.to_string(), raw_url.to_string()))
}

/// The row order every store returns for a grouping.
///
/// Single-bank groupings are ranked by volume (largest first); everything
/// else follows the natural order of its key. Bank names compare bytewise,
/// which is the `"C"` collation the SQL side orders by.
pub fn compare_rows(group_by: GroupBy, a: &AggregateRow, b: &AggregateRow) -> Ordering {
    match group_by {
        GroupBy::MakerBank | GroupBy::TakerBank => b
            .total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.key.cmp(&b.key)),
        _ => a.key.cmp(&b.key),
    }
}
