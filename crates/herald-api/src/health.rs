use axum::Json;

use herald_types::api::HealthResponse;

pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Alive".into(),
    })
}
