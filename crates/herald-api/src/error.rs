use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use herald_db::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Empty Message")]
    EmptyMessage,

    #[error("device_tokens must not be empty")]
    NoDeviceTokens,

    #[error("Failed to save notification")]
    Storage(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::EmptyMessage | ApiError::NoDeviceTokens => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
