use analytics::{AllocationError, AnalyticsError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_types::CoreError;
use database::DbError;
use ingest::IngestError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Ingest(#[from] IngestError),
    #[error("{0}")]
    Database(#[from] DbError),
    #[error("{0}")]
    Allocation(#[from] AllocationError),
    #[error("{0}")]
    Analytics(#[from] AnalyticsError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

/// Converts our custom `AppError` into an HTTP response.
///
/// Problems with the request or the uploaded file are 400s, unknown ids are
/// 404s, and anything the store or the server itself got wrong is a 500.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Ingest(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(DbError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Database(DbError::InvalidLink(_) | DbError::InvalidRecord(_)) => StatusCode::BAD_REQUEST,
            AppError::Allocation(AllocationError::Analytics(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Allocation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Analytics(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed.");
        } else {
            tracing::warn!(error = %self, "Request rejected.");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
