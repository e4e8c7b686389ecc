use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use meter_app::{ApiError, AppError};
use tokio::task::JoinError;
use tracing::{debug, error};

/// Failed request: the status line plus the JSON error body clients see.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: ApiError,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        let body = ApiError::from(err);
        let status = StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, body }
    }
}

/// A blocking scan task that panicked or was cancelled.
impl From<JoinError> for HttpError {
    fn from(err: JoinError) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            status,
            body: ApiError {
                status: status.as_u16(),
                message: format!("scan task failed: {err}"),
                code: Some("scan_aborted".to_string()),
            },
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status.as_u16();
        if self.status.is_server_error() {
            error!(status, message = %self.body.message, "request failed");
        } else {
            debug!(status, code = ?self.body.code, message = %self.body.message, "request rejected");
        }
        (self.status, Json(self.body)).into_response()
    }
}
