use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use meter_app::{AppConfig, AppState};
use meter_core::PriceTable;

use crate::HttpState;

#[tokio::test]
async fn serves_health() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig {
        db_path: temp_dir.path().join("usage.sqlite"),
        state_dir: temp_dir.path().join("state"),
        tenants_root: temp_dir.path().join("tenants"),
        projects_subdir: ".claude/projects".into(),
        retention_days: 90,
    };
    let app_state = AppState::new(config, PriceTable::bundled().expect("prices"));
    app_state.initialize().expect("initialize");
    let app = crate::router(HttpState::new(app_state));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn aborted_scan_task_is_a_server_error() {
    let handle = tokio::task::spawn_blocking(|| -> u32 { panic!("scan blew up") });
    let join_err = handle.await.expect_err("task panicked");
    let err = crate::errors::HttpError::from(join_err);
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = axum::response::IntoResponse::into_response(err);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
