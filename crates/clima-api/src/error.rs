use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clima_service::ServiceError;
use serde::Serialize;

/// JSON error body: `{kind, message}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::NotFound(_) | ServiceError::NoData(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(error = %self.0, kind = self.0.kind(), "request failed");
        }
        let body = ErrorBody {
            kind: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
