use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::{info, warn};

use super::dto::{HomeResponse, PredictRequest};
use super::error::ApiError;
use super::state::AppState;
use crate::service::{PredictError, PredictionResponse};

/// GET / - Liveness banner
pub async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: "FIFA World Cup AI API (Secured)",
    })
}

/// POST /predict - Outcome and class probabilities for one fixture
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(req) = body.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    // Lock is released before the model runs.
    let service = state.service.current();
    match service.predict(&req.home_team, &req.away_team, req.neutral_venue) {
        Ok(response) => {
            info!(
                home = %req.home_team,
                away = %req.away_team,
                neutral = req.neutral_venue,
                prediction = response.prediction.code(),
                "prediction served"
            );
            Ok(Json(response))
        }
        Err(err) => {
            if !matches!(err, PredictError::Encoding(_)) {
                warn!(home = %req.home_team, away = %req.away_team, error = %err, "prediction rejected");
            }
            Err(err.into())
        }
    }
}
