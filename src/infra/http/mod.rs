pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::health::HealthProbe;
use crate::application::render::RenderService;

pub use error::{ApiError, ErrorReport};

#[derive(Clone)]
pub struct AppState {
    pub render: Arc<RenderService>,
    pub health: Arc<HealthProbe>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(handlers::generate))
        .route("/preview/{name}", get(handlers::preview))
        .route("/download/{name}", get(handlers::download))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
