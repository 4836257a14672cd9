//! HTTP surface: `GET /` and rate-limited `POST /predict`.

mod dto;
mod error;
mod handlers;
pub mod rate_limit;
mod state;

pub use dto::PredictRequest;
pub use error::ApiError;
pub use rate_limit::{ClientLimiter, spawn_eviction};
pub use state::AppState;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router. The rate limit covers `/predict` only.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let limited = Router::new()
        .route("/predict", post(handlers::predict))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_by_client,
        ));

    Router::new()
        .route("/", get(handlers::home))
        .merge(limited)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
