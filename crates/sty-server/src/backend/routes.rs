use std::sync::Arc;
use axum::Json;
use axum::Router;
use axum::routing::{get, post};
use crate::backend::routes::style::{style_flux, style_transfer};
use crate::backend::schemas::HealthResponse;
use crate::backend::state::AppState;

mod style;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/style", post(style_transfer))
        .route("/api/style-flux", post(style_flux))
        .route("/health", get(health))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".into() })
}
