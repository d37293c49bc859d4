use crate::{error::AppError, AppState};
use analytics::{
    AllocationPlan, AllocationRequest, BankShare, DashboardHeatmaps, Kpi, MetricStats, MinutePoint,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use core_types::{BankSide, DashboardLink, GroupBy, Metric};
use database::{AggregateQuery, AggregateRow, DailySummary};
use ingest::{IngestError, IngestSummary, RejectedRow, SheetFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_METRICS: [Metric; 2] = [Metric::Amount, Metric::Rate];
const DEFAULT_TOP_N: usize = 15;

/// # GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// `csv` or `xlsx`; sniffed from the body when absent.
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadReport {
    pub format: SheetFormat,
    pub inserted: u64,
    pub summary: IngestSummary,
    pub rejected: Vec<RejectedRow>,
}

/// Zip (xlsx) and OLE (xls) containers; anything else is read as CSV.
fn sniff_format(body: &[u8]) -> SheetFormat {
    if body.starts_with(b"PK\x03\x04") || body.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        SheetFormat::Xlsx
    } else {
        SheetFormat::Csv
    }
}

/// # POST /api/trades/upload
/// Cleans the uploaded spreadsheet and appends the valid rows.
///
/// Schema problems reject the whole file with nothing stored; row problems
/// only drop the row and are listed in the report.
pub async fn upload_trades(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadReport>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("the upload is empty".to_string()));
    }
    let format = match params.format.as_deref() {
        Some(raw) => raw.parse::<SheetFormat>().map_err(IngestError::from)?,
        None => sniff_format(&body),
    };

    let _write = state.write_lock.lock().await;
    let normalizer = state.normalizer.clone();
    let outcome = tokio::task::spawn_blocking(move || ingest::ingest_bytes(&body, format, &normalizer))
        .await
        .map_err(|e| AppError::Internal(format!("ingest task failed: {e}")))??;

    let inserted = if outcome.records.is_empty() {
        0
    } else {
        state.store.insert(&outcome.records).await?
    };
    state.invalidate_aggregates().await;

    info!(
        ?format,
        inserted,
        rejected = outcome.rejected.len(),
        "Upload processed."
    );
    Ok(Json(UploadReport {
        format,
        inserted,
        summary: outcome.summary,
        rejected: outcome.rejected,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmParams {
    #[serde(default)]
    pub confirm: bool,
}

/// # DELETE /api/trades?confirm=true
pub async fn truncate_trades(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfirmParams>,
) -> Result<Json<Value>, AppError> {
    if !params.confirm {
        return Err(AppError::BadRequest(
            "deleting every trade requires confirm=true".to_string(),
        ));
    }
    let _write = state.write_lock.lock().await;
    state.store.truncate().await?;
    state.invalidate_aggregates().await;
    warn!("All trades deleted on request.");
    Ok(Json(json!({ "truncated": true })))
}

/// # GET /api/trades/count
pub async fn count_trades(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let count = state.store.count().await?;
    Ok(Json(json!({ "count": count })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// # GET /api/aggregates/:group_by
/// Grouped totals, served from the cache until the next write.
pub async fn get_aggregates(
    State(state): State<Arc<AppState>>,
    Path(group_by): Path<String>,
    Query(range): Query<DateRange>,
) -> Result<Json<Vec<AggregateRow>>, AppError> {
    let group_by: GroupBy = group_by.parse()?;
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(AppError::BadRequest(format!("'from' ({from}) is after 'to' ({to})")));
        }
    }
    let query = AggregateQuery::new(group_by).between(range.from, range.to);

    let generation = match state.cached_aggregate(&query).await {
        Ok(rows) => return Ok(Json(rows)),
        Err(generation) => generation,
    };
    let rows = state.store.aggregate(&query).await?;
    state.cache_aggregate(generation, query, rows.clone()).await;
    Ok(Json(rows))
}

/// # GET /api/summary
/// Per-day history, newest first.
pub async fn get_daily_summary(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DailySummary>>, AppError> {
    Ok(Json(state.store.daily_summary().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsParams {
    /// Comma-separated, e.g. `amount,rate`.
    pub metrics: Option<String>,
}

fn parse_metrics(raw: Option<&str>) -> Result<Vec<Metric>, AppError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_METRICS.to_vec());
    };
    let mut metrics = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let metric: Metric = part.parse()?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    if metrics.is_empty() {
        return Err(AppError::BadRequest("select at least one metric".to_string()));
    }
    Ok(metrics)
}

/// # GET /api/dashboard/kpis?metrics=amount,rate
pub async fn get_kpis(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricsParams>,
) -> Result<Json<Vec<Kpi>>, AppError> {
    let metrics = parse_metrics(params.metrics.as_deref())?;
    let records = state.store.load_all().await?;
    Ok(Json(analytics::kpis(&records, &metrics)?))
}

/// # GET /api/dashboard/stats?metrics=amount,rate
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricsParams>,
) -> Result<Json<Vec<MetricStats>>, AppError> {
    let metrics = parse_metrics(params.metrics.as_deref())?;
    let records = state.store.load_all().await?;
    let stats = metrics
        .into_iter()
        .map(|m| analytics::describe(&records, m))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct BankSharesResponse {
    pub makers: Vec<BankShare>,
    pub takers: Vec<BankShare>,
}

/// # GET /api/dashboard/banks
pub async fn get_bank_shares(State(state): State<Arc<AppState>>) -> Result<Json<BankSharesResponse>, AppError> {
    let records = state.store.load_all().await?;
    Ok(Json(BankSharesResponse {
        makers: analytics::bank_volume_shares(&records, BankSide::Maker)?,
        takers: analytics::bank_volume_shares(&records, BankSide::Taker)?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HeatmapParams {
    pub top_n: Option<usize>,
}

/// # GET /api/dashboard/heatmaps?top_n=15
pub async fn get_heatmaps(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HeatmapParams>,
) -> Result<Json<DashboardHeatmaps>, AppError> {
    let top_n = params.top_n.unwrap_or(DEFAULT_TOP_N);
    if top_n == 0 {
        return Err(AppError::BadRequest("top_n must be at least 1".to_string()));
    }
    let records = state.store.load_all().await?;
    Ok(Json(analytics::heatmaps(&records, top_n)?))
}

/// # GET /api/dashboard/minutes
pub async fn get_minute_series(State(state): State<Arc<AppState>>) -> Result<Json<Vec<MinutePoint>>, AppError> {
    let records = state.store.load_all().await?;
    Ok(Json(analytics::minute_series(&records)?))
}

/// Optimizer inputs; unset fields take the configured defaults.
#[derive(Debug, Deserialize)]
pub struct AllocationBody {
    pub target_volume: Decimal,
    pub min_share: Option<Decimal>,
    pub max_share: Option<Decimal>,
    pub risk_aversion: Option<Decimal>,
    pub capacity_percentile: Option<Decimal>,
}

/// # POST /api/allocation
pub async fn post_allocation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AllocationBody>,
) -> Result<Json<AllocationPlan>, AppError> {
    let defaults = &state.allocation;
    let request = AllocationRequest {
        target_volume: body.target_volume,
        min_share: body.min_share.unwrap_or(defaults.min_share),
        max_share: body.max_share.unwrap_or(defaults.max_share),
        risk_aversion: body.risk_aversion.unwrap_or(defaults.risk_aversion),
        capacity_percentile: body.capacity_percentile.unwrap_or(defaults.capacity_percentile),
    };
    let records = state.store.load_all().await?;
    Ok(Json(analytics::optimize_allocation(&records, &request)?))
}

#[derive(Debug, Deserialize)]
pub struct NewLink {
    pub name: String,
    pub url: String,
}

/// # GET /api/links
pub async fn list_links(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DashboardLink>>, AppError> {
    Ok(Json(state.store.list_links().await?))
}

/// # POST /api/links
pub async fn add_link(
    State(state): State<Arc<AppState>>,
    Json(link): Json<NewLink>,
) -> Result<(StatusCode, Json<DashboardLink>), AppError> {
    let link = state.store.add_link(&link.name, &link.url).await?;
    info!(id = link.id, name = %link.name, "Dashboard link added.");
    Ok((StatusCode::CREATED, Json(link)))
}

/// # DELETE /api/links/:id
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    state.store.delete_link(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_default_dedupe_and_reject_unknown_names() {
        assert_eq!(parse_metrics(None).unwrap(), vec![Metric::Amount, Metric::Rate]);
        assert_eq!(
            parse_metrics(Some("hour, rate,hour")).unwrap(),
            vec![Metric::Hour, Metric::Rate]
        );
        assert!(matches!(parse_metrics(Some(" , ")), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_metrics(Some("volume")), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn workbooks_are_sniffed_by_magic_bytes() {
        assert_eq!(sniff_format(b"PK\x03\x04rest"), SheetFormat::Xlsx);
        assert_eq!(sniff_format(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1]), SheetFormat::Xlsx);
        assert_eq!(sniff_format(b"Trade Date;Montant"), SheetFormat::Csv);
    }
}
