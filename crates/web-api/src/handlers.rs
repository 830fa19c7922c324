use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use refdata_core::{AuthContext, RefDataError};
use refdata_data::{
    CorporateActionQuery, FactorSeriesQuery, JobSource, PriceSnapshotInput, SeriesQuery,
    UniverseSnapshotInput,
};
use refdata_services::{
    CorporateActionItem, EnqueueRequest, EnqueueResult, FactorSeriesItem, IngestResult,
    ItemsView, JobView, LatestPricesView, PriceSeriesItem, UniverseHistoryView,
    UniverseSnapshotView,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{ensure_admin, ensure_viewer};
use crate::error::{ApiError, ApiResult};
use crate::params::{self, HistoryParams};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentParams {
    pub as_of: Option<String>,
    pub include_constituent_meta: Option<String>,
}

/// Latest universe snapshot on or before `asOf`.
///
/// # Errors
/// 403 without a read role, 400 on a malformed `asOf`, 404 when none exists.
pub async fn current_universe(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<CurrentParams>,
) -> ApiResult<Json<UniverseSnapshotView>> {
    ensure_viewer(&ctx)?;
    let as_of = params::date(params.as_of.as_deref(), "invalid_as_of", "asOf")?;
    let include_meta = params::include_meta(params.include_constituent_meta.as_deref());

    match state.query.current_universe(ctx.tenant_id, as_of, include_meta).await {
        Ok(view) => Ok(Json(view)),
        Err(RefDataError::SnapshotNotFound) => Err(ApiError::not_found(
            "universe_not_found",
            "No universe snapshot available",
        )),
        Err(err) => Err(err.into()),
    }
}

/// Newest-first page of universe snapshots.
///
/// # Errors
/// 403 without a read role, 400 on malformed dates, limit or cursor.
pub async fn universe_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<UniverseHistoryView>> {
    ensure_viewer(&ctx)?;
    let query = params.to_query()?;
    let include_meta = params::include_meta(params.include_constituent_meta.as_deref());
    let view = state
        .query
        .universe_history(ctx.tenant_id, &query, include_meta)
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RebalanceBody {
    pub effective_date: Option<String>,
    #[serde(default)]
    pub source: JobSource,
    #[serde(default)]
    pub force: bool,
}

/// Queues a manual rebalance; answers 202.
///
/// # Errors
/// 403 for non-admins, 400 on a bad body, 409 when a job is already active.
pub async fn enqueue_rebalance(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<EnqueueResult>)> {
    ensure_admin(&ctx)?;
    let body: RebalanceBody = params::json_body(&body)?;
    let effective_date = params::date(body.effective_date.as_deref(), "invalid_request", "effectiveDate")
        .map_err(|_| ApiError::BadRequest {
            code: "invalid_request",
            message: "Invalid rebalance job payload".to_string(),
            details: Some(json!({ "issues": ["effectiveDate must be YYYY-MM-DD"] })),
        })?;

    let request = EnqueueRequest {
        effective_date,
        source: body.source,
        force: body.force,
        requested_by: ctx.user_id.clone(),
    };
    let result = state.jobs.enqueue_manual_job(ctx.tenant_id, &request).await?;
    Ok((StatusCode::ACCEPTED, Json(result)))
}

/// Status of one of the caller's rebalance jobs.
///
/// # Errors
/// 403 without a read role, 400 on a malformed id, 404 for unknown jobs.
pub async fn get_rebalance_job(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobView>> {
    ensure_viewer(&ctx)?;
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::bad_request("invalid_job_id", "job id must be a UUID"))?;
    let job = state.jobs.find_job(ctx.tenant_id, job_id).await?;
    Ok(Json(JobView::from(&job)))
}

/// # Errors
/// 403 for non-admins, 400 on invalid input, 409 on duplicate rows.
pub async fn ingest_universe(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<IngestResult>)> {
    ensure_admin(&ctx)?;
    let input: UniverseSnapshotInput = params::json_body(&body)?;
    let result = state.ingestion.ingest_universe(ctx.tenant_id, &input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// # Errors
/// 403 for non-admins, 400 on invalid input, 409 on duplicate rows.
pub async fn ingest_prices(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<IngestResult>)> {
    ensure_admin(&ctx)?;
    let input: PriceSnapshotInput = params::json_body(&body)?;
    let result = state.ingestion.ingest_prices(ctx.tenant_id, &input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPricesParams {
    pub vendor: Option<String>,
    pub as_of: Option<String>,
}

pub async fn latest_prices(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<LatestPricesParams>,
) -> ApiResult<Json<LatestPricesView>> {
    ensure_viewer(&ctx)?;
    let vendor = params::vendor(params.vendor.as_deref())?;
    let as_of = params::date(params.as_of.as_deref(), "invalid_as_of", "asOf")?;
    let view = state.query.latest_prices(ctx.tenant_id, vendor, as_of).await?;
    Ok(Json(view))
}

/// Shared filter set for series and corporate action reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesParams {
    pub vendor: Option<String>,
    pub tickers: Option<String>,
    pub factor_names: Option<String>,
    pub event_types: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl SeriesParams {
    fn range(&self) -> ApiResult<(Option<chrono::NaiveDate>, Option<chrono::NaiveDate>)> {
        Ok((
            params::date(self.start_date.as_deref(), "invalid_start_date", "startDate")?,
            params::date(self.end_date.as_deref(), "invalid_end_date", "endDate")?,
        ))
    }
}

pub async fn price_series(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<SeriesParams>,
) -> ApiResult<Json<ItemsView<PriceSeriesItem>>> {
    ensure_viewer(&ctx)?;
    let vendor = params::vendor(params.vendor.as_deref())?;
    let (start_date, end_date) = params.range()?;
    let query = SeriesQuery {
        tickers: params::list(params.tickers.as_deref()),
        start_date,
        end_date,
    };
    Ok(Json(state.query.price_series(ctx.tenant_id, vendor, &query).await?))
}

pub async fn factor_series(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<SeriesParams>,
) -> ApiResult<Json<ItemsView<FactorSeriesItem>>> {
    ensure_viewer(&ctx)?;
    let vendor = params::vendor(params.vendor.as_deref())?;
    let (start_date, end_date) = params.range()?;
    let query = FactorSeriesQuery {
        tickers: params::list(params.tickers.as_deref()),
        factor_names: params::list(params.factor_names.as_deref()),
        start_date,
        end_date,
    };
    Ok(Json(state.query.factor_series(ctx.tenant_id, vendor, &query).await?))
}

pub async fn corporate_actions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<SeriesParams>,
) -> ApiResult<Json<ItemsView<CorporateActionItem>>> {
    ensure_viewer(&ctx)?;
    let (start_date, end_date) = params.range()?;
    let query = CorporateActionQuery {
        tickers: params::list(params.tickers.as_deref()),
        event_types: params::list(params.event_types.as_deref()),
        start_date,
        end_date,
    };
    Ok(Json(state.query.corporate_actions(ctx.tenant_id, &query).await?))
}

/// Fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::not_found("not_found", "No such route")
}
