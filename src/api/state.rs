use std::sync::Arc;

use crate::service::{PredictionService, ServiceSlot};

use super::rate_limit::ClientLimiter;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ServiceSlot>,
    pub limiter: Arc<ClientLimiter>,
}

impl AppState {
    pub fn new(service: Arc<ServiceSlot>, limiter: Arc<ClientLimiter>) -> Self {
        Self { service, limiter }
    }

    /// Convenience for tests and benches: one service, fresh limiter.
    pub fn with_service(service: PredictionService, per_minute: u32) -> Self {
        Self::new(
            Arc::new(ServiceSlot::new(service)),
            Arc::new(ClientLimiter::per_minute(per_minute)),
        )
    }
}
