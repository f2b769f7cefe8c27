use std::sync::Arc;

use axum::{ Router, routing::get };
use tower::ServiceBuilder;
use tower_http::{ cors::CorsLayer, trace::TraceLayer };

use crate::verification::VerificationController;

pub mod verification;

#[derive(Clone)]
pub struct AppState {
    pub verification: Arc<VerificationController>,
}

impl AppState {
    pub fn new(verification: Arc<VerificationController>) -> Self {
        Self { verification }
    }
}

/// Ops endpoints served next to the bot.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/verification", get(verification::get_overview))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
}

async fn health_check() -> &'static str {
    "OK"
}
