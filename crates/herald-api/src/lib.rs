pub mod error;
pub mod health;
pub mod middleware;
pub mod notifications;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use herald_db::{NotificationStore, RetryPolicy};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn NotificationStore>,
    /// Shared secret expected in the `Authorization` header.
    pub auth_token: String,
    pub insert_retry: RetryPolicy,
}

/// Ingress routes. `/health` is public, everything else needs the bearer secret.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/notifications", post(notifications::send_notification))
        .layer(from_fn_with_state(state.clone(), middleware::require_bearer))
        .with_state(state);

    let public_routes: Router = Router::new().route("/health", get(health::check));

    Router::new().merge(public_routes).merge(protected_routes)
}
