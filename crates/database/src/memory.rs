use crate::error::DbError;
use crate::store::{
    compare_rows, round_avg_rate, validate_link, AggregateQuery, AggregateRow, DailySummary, GroupKey, TradeStore,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use core_types::{DashboardLink, TradeRecord};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory storage implementation for development/testing.
///
/// Mirrors the PostgreSQL gateway's semantics, including row ordering of
/// aggregates and all-or-nothing inserts.
#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    trades: Mutex<Vec<TradeRecord>>,
    links: Mutex<Vec<DashboardLink>>,
    next_link_id: Mutex<i32>,
    reject_writes: bool,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose inserts always fail, for exercising error paths.
    pub fn rejecting_writes() -> Self {
        Self {
            reject_writes: true,
            ..Self::default()
        }
    }
}

fn checked_add(total: Decimal, value: Decimal, column: &str) -> Result<Decimal, DbError> {
    total
        .checked_add(value)
        .ok_or_else(|| DbError::Overflow(column.to_string()))
}

#[derive(Default)]
struct Accumulator {
    total_amount: Decimal,
    trade_count: i64,
    min_rate: Option<Decimal>,
    max_rate: Option<Decimal>,
    rate_sum: Decimal,
}

impl Accumulator {
    fn add(&mut self, record: &TradeRecord) -> Result<(), DbError> {
        self.total_amount = checked_add(self.total_amount, record.amount, "amount")?;
        self.trade_count += 1;
        self.rate_sum = checked_add(self.rate_sum, record.rate, "rate")?;
        self.min_rate = Some(self.min_rate.map_or(record.rate, |m| m.min(record.rate)));
        self.max_rate = Some(self.max_rate.map_or(record.rate, |m| m.max(record.rate)));
        Ok(())
    }

    fn finish(self, key: GroupKey) -> AggregateRow {
        AggregateRow {
            key,
            total_amount: self.total_amount,
            trade_count: self.trade_count,
            min_rate: self.min_rate.unwrap_or_default(),
            max_rate: self.max_rate.unwrap_or_default(),
            avg_rate: round_avg_rate(self.rate_sum / Decimal::from(self.trade_count.max(1))),
        }
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn insert(&self, records: &[TradeRecord]) -> Result<u64, DbError> {
        if self.reject_writes {
            return Err(DbError::Insert {
                batch_size: records.len(),
                source: "store is read-only".into(),
            });
        }
        for record in records {
            record.check()?;
        }
        let mut trades = self.trades.lock().await;
        trades.extend_from_slice(records);
        debug!(rows = records.len(), total = trades.len(), "Stored trades in memory.");
        Ok(records.len() as u64)
    }

    async fn truncate(&self) -> Result<(), DbError> {
        self.trades.lock().await.clear();
        Ok(())
    }

    async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>, DbError> {
        let trades = self.trades.lock().await;
        let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();
        for record in trades.iter().filter(|r| query.matches(r)) {
            groups
                .entry(GroupKey::of(record, query.group_by))
                .or_default()
                .add(record)?;
        }

        let mut rows: Vec<AggregateRow> = groups
            .into_iter()
            .map(|(key, acc)| acc.finish(key))
            .collect();
        rows.sort_by(|a, b| compare_rows(query.group_by, a, b));
        Ok(rows)
    }

    async fn daily_summary(&self) -> Result<Vec<DailySummary>, DbError> {
        let trades = self.trades.lock().await;
        let mut days: BTreeMap<NaiveDate, (i64, Decimal, BTreeSet<&str>, BTreeSet<&str>)> = BTreeMap::new();
        for r in trades.iter() {
            let day = days.entry(r.trade_date).or_default();
            day.0 += 1;
            day.1 = checked_add(day.1, r.amount, "amount")?;
            day.2.insert(&r.maker_bank);
            day.3.insert(&r.taker_bank);
        }
        Ok(days
            .into_iter()
            .rev()
            .map(|(trade_date, (transactions, volume_total, makers, takers))| DailySummary {
                trade_date,
                transactions,
                volume_total,
                nb_makers: makers.len() as i64,
                nb_takers: takers.len() as i64,
            })
            .collect())
    }

    async fn load_all(&self) -> Result<Vec<TradeRecord>, DbError> {
        let mut trades = self.trades.lock().await.clone();
        trades.sort_by_key(|r| (r.trade_date, r.hour, r.minute));
        Ok(trades)
    }

    async fn count(&self) -> Result<i64, DbError> {
        Ok(self.trades.lock().await.len() as i64)
    }

    async fn add_link(&self, name: &str, url: &str) -> Result<DashboardLink, DbError> {
        let (name, url) = validate_link(name, url)?;
        let mut next_id = self.next_link_id.lock().await;
        *next_id += 1;
        let link = DashboardLink {
            id: *next_id,
            name,
            url,
            created_at: Utc::now(),
        };
        self.links.lock().await.push(link.clone());
        Ok(link)
    }

    async fn list_links(&self) -> Result<Vec<DashboardLink>, DbError> {
        let mut links = self.links.lock().await.clone();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(links)
    }

    async fn delete_link(&self, id: i32) -> Result<(), DbError> {
        let mut links = self.links.lock().await;
        let before = links.len();
        links.retain(|l| l.id != id);
        if links.len() == before {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
