mod errors;
mod handlers;
mod middleware;
mod requests;
mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use errors::HttpError;
pub use requests::{RangeRequest, TenantRangeRequest, TenantRequest, UsageEventResponse};
pub use state::HttpState;

pub fn router(state: HttpState) -> Router<()> {
    let api = Router::new()
        .route("/tenant_summary", post(handlers::tenant_summary))
        .route("/tenant_daily", post(handlers::tenant_daily))
        .route("/tenant_models", post(handlers::tenant_models))
        .route("/dashboard", post(handlers::dashboard))
        .route("/scan", post(handlers::scan))
        .route("/quota_check", post(handlers::quota_check))
        .route("/quota_set", post(handlers::quota_set))
        .route("/usage_events", post(handlers::usage_events));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .layer(axum_middleware::from_fn(middleware::log_requests))
        .with_state(state)
}

#[cfg(test)]
mod tests;
