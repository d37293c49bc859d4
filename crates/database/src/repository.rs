use crate::error::DbError;
use crate::sql::{self, MAX_ROWS_PER_INSERT};
use crate::store::{round_avg_rate, validate_link, AggregateQuery, AggregateRow, DailySummary, GroupKey, TradeStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DashboardLink, TradeRecord};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::{QueryBuilder, Row};
use tracing::{info, warn};

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
    chunk_size: usize,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            chunk_size: 1000,
        }
    }

    /// Rows per multi-row `INSERT`; capped by the PostgreSQL bind limit.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_ROWS_PER_INSERT);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_aggregate(row: PgRow) -> Result<AggregateRow, sqlx::Error> {
    let hour: Option<i16> = row.try_get("hour")?;
    let minute: Option<i16> = row.try_get("minute")?;
    let to_u8 = |v: Option<i16>, column: &str| {
        v.map(u8::try_from)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(e),
            })
    };

    Ok(AggregateRow {
        key: GroupKey {
            trade_date: row.try_get::<Option<NaiveDate>, _>("trade_date")?,
            maker_bank: row.try_get("maker_bank")?,
            taker_bank: row.try_get("taker_bank")?,
            hour: to_u8(hour, "hour")?,
            minute: to_u8(minute, "minute")?,
        },
        total_amount: row.try_get::<Decimal, _>("total_amount")?,
        trade_count: row.try_get("trade_count")?,
        min_rate: row.try_get("min_rate")?,
        max_rate: row.try_get("max_rate")?,
        avg_rate: round_avg_rate(row.try_get("avg_rate")?),
    })
}

#[async_trait]
impl TradeStore for DbRepository {
    /// Saves a batch of trades within a single transaction for atomicity.
    ///
    /// Rows are written with multi-row `INSERT` statements; any failure rolls
    /// the whole batch back.
    async fn insert(&self, records: &[TradeRecord]) -> Result<u64, DbError> {
        let batch_size = records.len();
        if batch_size == 0 {
            return Ok(0);
        }
        for record in records {
            record.check()?;
        }
        let insert_error = |e: sqlx::Error| DbError::Insert {
            batch_size,
            source: Box::new(e),
        };

        let mut tx = self.pool.begin().await.map_err(insert_error)?;
        let mut written = 0u64;

        for chunk in records.chunks(self.chunk_size) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(sql::INSERT_PREFIX);
            builder.push_values(chunk, |mut b, r| {
                b.push_bind(r.trade_date)
                    .push_bind(i16::from(r.hour))
                    .push_bind(i16::from(r.minute))
                    .push_bind(r.amount)
                    .push_bind(r.rate)
                    .push_bind(r.maker_bank.as_str())
                    .push_bind(r.taker_bank.as_str());
            });
            let result = builder.build().execute(&mut *tx).await.map_err(insert_error)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(insert_error)?;
        info!(rows = written, "Stored trades.");
        Ok(written)
    }

    async fn truncate(&self) -> Result<(), DbError> {
        sqlx::query("TRUNCATE TABLE trades")
            .execute(&self.pool)
            .await
            .map_err(DbError::Truncate)?;
        warn!("Trades table truncated.");
        Ok(())
    }

    async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>, DbError> {
        let rows = sqlx::query(&sql::aggregate_sql(query.group_by))
            .bind(query.from)
            .bind(query.to)
            .try_map(decode_aggregate)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn daily_summary(&self) -> Result<Vec<DailySummary>, DbError> {
        let rows = sqlx::query_as::<_, DailySummary>(sql::DAILY_SUMMARY_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn load_all(&self) -> Result<Vec<TradeRecord>, DbError> {
        let rows = sqlx::query_as::<_, TradeRecord>(sql::LOAD_ALL_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trades")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn add_link(&self, name: &str, url: &str) -> Result<DashboardLink, DbError> {
        let (name, url) = validate_link(name, url)?;
        let link = sqlx::query_as::<_, DashboardLink>(
            "INSERT INTO dashboard_links (name, url) VALUES ($1, $2) RETURNING id, name, url, created_at",
        )
        .bind(name)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }

    async fn list_links(&self) -> Result<Vec<DashboardLink>, DbError> {
        let links = sqlx::query_as::<_, DashboardLink>(
            "SELECT id, name, url, created_at FROM dashboard_links ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn delete_link(&self, id: i32) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM dashboard_links WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
