//! # FX Dashboard Web Server
//!
//! The axum JSON API in front of the ingest pipeline, the trade store and
//! the dashboard analytics. Handlers share one `AppState` holding the store,
//! the configured normalizer, the write lock and the aggregate cache.

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use configuration::{AllocationSettings, Config, ConfigError, IngestSettings};
use database::{AggregateQuery, AggregateRow, DbRepository, TradeStore};
use ingest::{AliasTable, TradeNormalizer};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// Distinct aggregate queries kept between two writes. Further queries are
/// answered from the store without being cached.
pub const MAX_CACHED_AGGREGATES: usize = 64;

/// Aggregate results of the current data generation. Every write bumps the
/// generation, so a read that overlapped a write can tell its rows are stale.
#[derive(Default)]
struct AggregateCache {
    generation: u64,
    entries: HashMap<AggregateQuery, Vec<AggregateRow>>,
}

/// The shared application state that all handlers can access.
pub struct AppState {
    pub store: Arc<dyn TradeStore>,
    pub normalizer: TradeNormalizer,
    pub allocation: AllocationSettings,
    /// Held for the whole of an upload or a truncation, so one pipeline run
    /// completes before the next write starts.
    write_lock: Mutex<()>,
    aggregate_cache: Mutex<AggregateCache>,
}

impl AppState {
    pub fn new(store: Arc<dyn TradeStore>, normalizer: TradeNormalizer, allocation: AllocationSettings) -> Self {
        Self {
            store,
            normalizer,
            allocation,
            write_lock: Mutex::new(()),
            aggregate_cache: Mutex::new(AggregateCache::default()),
        }
    }

    /// The cached rows for `query`, or the generation to pass back to
    /// `cache_aggregate` once the store has been read.
    pub(crate) async fn cached_aggregate(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>, u64> {
        let cache = self.aggregate_cache.lock().await;
        cache.entries.get(query).cloned().ok_or(cache.generation)
    }

    /// Stores rows read during `generation`. Dropped if a write happened
    /// since, or if the cache is full.
    pub(crate) async fn cache_aggregate(&self, generation: u64, query: AggregateQuery, rows: Vec<AggregateRow>) {
        let mut cache = self.aggregate_cache.lock().await;
        if cache.generation != generation {
            tracing::debug!(?query, "Aggregate overlapped a write; not cached.");
            return;
        }
        if cache.entries.len() >= MAX_CACHED_AGGREGATES && !cache.entries.contains_key(&query) {
            return;
        }
        cache.entries.insert(query, rows);
    }

    pub(crate) async fn invalidate_aggregates(&self) {
        let mut cache = self.aggregate_cache.lock().await;
        cache.generation += 1;
        cache.entries.clear();
    }
}

/// Builds the column mapper from the built-in aliases plus the configured extras.
pub fn build_normalizer(settings: &IngestSettings) -> Result<TradeNormalizer, ConfigError> {
    let aliases = settings
        .aliases()?
        .into_iter()
        .fold(AliasTable::default(), |table, (field, headers)| table.with_aliases(field, headers));
    Ok(TradeNormalizer::new(aliases))
}

/// Wires every route onto the given state.
pub fn build_router(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/trades", delete(handlers::truncate_trades))
        .route("/api/trades/upload", post(handlers::upload_trades))
        .route("/api/trades/count", get(handlers::count_trades))
        .route("/api/aggregates/:group_by", get(handlers::get_aggregates))
        .route("/api/summary", get(handlers::get_daily_summary))
        .route("/api/dashboard/kpis", get(handlers::get_kpis))
        .route("/api/dashboard/stats", get(handlers::get_stats))
        .route("/api/dashboard/banks", get(handlers::get_bank_shares))
        .route("/api/dashboard/heatmaps", get(handlers::get_heatmaps))
        .route("/api/dashboard/minutes", get(handlers::get_minute_series))
        .route("/api/allocation", post(handlers::post_allocation))
        .route("/api/links", get(handlers::list_links).post(handlers::add_link))
        .route("/api/links/:id", delete(handlers::delete_link))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit_bytes))
}

/// Connects to PostgreSQL, makes sure the tables exist and serves the API on `addr`.
pub async fn run_server(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let database_url = config.database_url()?;
    let pool = database::connect(&database_url, &config.database)
        .await
        .context("failed to connect to the database")?;
    database::ensure_schema(&pool)
        .await
        .context("failed to create the database schema")?;
    let repo = DbRepository::new(pool).with_chunk_size(config.ingest.insert_chunk_size);

    let state = Arc::new(AppState::new(
        Arc::new(repo),
        build_normalizer(&config.ingest)?,
        config.allocation.clone(),
    ));
    let app = build_router(state, config.server.body_limit_bytes());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Web server listening.");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::{CanonicalField, GroupBy};
    use database::InMemoryTradeStore;

    fn state() -> AppState {
        AppState::new(
            Arc::new(InMemoryTradeStore::new()),
            TradeNormalizer::default(),
            AllocationSettings::default(),
        )
    }

    #[test]
    fn configured_aliases_extend_the_defaults() {
        let mut settings = IngestSettings::default();
        settings
            .extra_aliases
            .insert("amount".to_string(), vec!["Notional".to_string()]);

        let normalizer = build_normalizer(&settings).unwrap();
        let accepted = normalizer.aliases().accepted(CanonicalField::Amount);
        assert_eq!(accepted.first().map(String::as_str), Some("Montant"));
        assert_eq!(accepted.last().map(String::as_str), Some("Notional"));
    }

    #[tokio::test]
    async fn rows_read_before_a_write_are_not_cached() {
        let state = state();
        let query = AggregateQuery::new(GroupBy::MakerBank);
        let generation = state.cached_aggregate(&query).await.unwrap_err();

        state.invalidate_aggregates().await;
        state.cache_aggregate(generation, query.clone(), Vec::new()).await;
        let fresh = state.cached_aggregate(&query).await.unwrap_err();
        assert_eq!(fresh, generation + 1);

        state.cache_aggregate(fresh, query.clone(), Vec::new()).await;
        assert_eq!(state.cached_aggregate(&query).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn cache_stops_growing_when_full() {
        let state = state();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let queries: Vec<AggregateQuery> = (0..=MAX_CACHED_AGGREGATES as u64)
            .map(|i| AggregateQuery::new(GroupBy::TradeDate).between(start.checked_add_days(chrono::Days::new(i)), None))
            .collect();
        for query in &queries {
            state.cache_aggregate(0, query.clone(), Vec::new()).await;
        }

        assert!(state.cached_aggregate(&queries[0]).await.is_ok());
        assert!(state.cached_aggregate(&queries[MAX_CACHED_AGGREGATES]).await.is_err());
        assert_eq!(state.aggregate_cache.lock().await.entries.len(), MAX_CACHED_AGGREGATES);
    }
}
