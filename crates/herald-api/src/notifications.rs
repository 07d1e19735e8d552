use axum::{Json, extract::State};
use chrono::Utc;
use tokio::time::Instant;
use tracing::{error, info};

use herald_db::insert_with_retry;
use herald_types::api::{SendNotificationRequest, SendNotificationResponse};

use crate::AppState;
use crate::error::ApiError;

/// Persist the notification and acknowledge. Delivery happens later; the
/// response says nothing about it.
pub async fn send_notification(
    State(state): State<AppState>,
    Json(req): Json<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>, ApiError> {
    let started = Instant::now();

    let payload = req.notification.ok_or(ApiError::EmptyMessage)?;
    if payload.device_tokens.is_empty() || payload.device_tokens.iter().any(|t| t.is_empty()) {
        return Err(ApiError::NoDeviceTokens);
    }

    let notification = payload.into_new(Utc::now());

    let id = insert_with_retry(state.store.as_ref(), &notification, state.insert_retry)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to save notification");
            ApiError::Storage(e)
        })?;

    info!(
        id,
        title = %notification.title,
        tokens = notification.device_tokens.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Notification accepted"
    );

    Ok(Json(SendNotificationResponse {
        message: "Message Received".into(),
    }))
}
