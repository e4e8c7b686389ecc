use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use meter_app::{LiveUsageEvent, QuotaUpdate, resolve_date_range};
use meter_core::local_today;
use serde_json::json;
use tracing::info;

use crate::{
    errors::HttpError,
    requests::{
        EmptyRequest, RangeRequest, TenantRangeRequest, TenantRequest, UsageEventResponse,
    },
    state::HttpState,
};

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn tenant_summary(
    State(state): State<HttpState>,
    Json(req): Json<TenantRangeRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let range = resolve_date_range(&req.params(), local_today())?;
    let response = state
        .app
        .services
        .analytics
        .tenant_summary(&req.tenant_id, &range)?;
    Ok(Json(response))
}

pub async fn tenant_daily(
    State(state): State<HttpState>,
    Json(req): Json<TenantRangeRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let range = resolve_date_range(&req.params(), local_today())?;
    let response = state
        .app
        .services
        .analytics
        .tenant_daily(&req.tenant_id, &range)?;
    Ok(Json(response))
}

pub async fn tenant_models(
    State(state): State<HttpState>,
    Json(req): Json<TenantRangeRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let range = resolve_date_range(&req.params(), local_today())?;
    let response = state
        .app
        .services
        .analytics
        .tenant_models(&req.tenant_id, &range)?;
    Ok(Json(response))
}

pub async fn dashboard(
    State(state): State<HttpState>,
    Json(req): Json<RangeRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let range = resolve_date_range(&req.params(), local_today())?;
    let response = state.app.services.analytics.dashboard(&range)?;
    Ok(Json(response))
}

/// Manual scan trigger. Runs the cycle to completion before answering.
pub async fn scan(
    State(state): State<HttpState>,
    Json(_): Json<EmptyRequest>,
) -> Result<impl IntoResponse, HttpError> {
    info!("manual scan requested");
    let scan = state.app.services.scan.clone();
    let outcome = tokio::task::spawn_blocking(move || scan.run()).await??;
    Ok(Json(outcome))
}

pub async fn quota_check(
    State(state): State<HttpState>,
    Json(req): Json<TenantRequest>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(state.app.services.quota.check_or_allow(&req.tenant_id)))
}

pub async fn quota_set(
    State(state): State<HttpState>,
    Json(req): Json<QuotaUpdate>,
) -> Result<impl IntoResponse, HttpError> {
    let quota = state.app.services.quota.set(req)?;
    Ok(Json(quota))
}

pub async fn usage_events(
    State(state): State<HttpState>,
    Json(event): Json<LiveUsageEvent>,
) -> Result<impl IntoResponse, HttpError> {
    let id = state.app.services.usage.record_live_event(event)?;
    Ok(Json(UsageEventResponse {
        recorded: id.is_some(),
        id,
    }))
}
