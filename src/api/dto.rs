use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub neutral_venue: bool,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub message: &'static str,
}
