use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::AppState;

pub const DEFAULT_PER_MINUTE: u32 = 10;

const WINDOW: Duration = Duration::from_secs(60);

type KeyedLimiter<C> =
    RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// `requests` up front, then a single slot back per full window.
fn window_quota(requests: NonZeroU32) -> Quota {
    Quota::with_period(WINDOW)
        .map(|quota| quota.allow_burst(requests))
        .unwrap_or_else(|| Quota::per_minute(requests))
}

/// Per-client-IP quota, keyed on the peer address.
pub struct ClientLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
}

impl ClientLimiter {
    /// A zero quota is clamped to one request per minute.
    pub fn per_minute(requests: u32) -> Self {
        Self::with_clock(requests, DefaultClock::default())
    }
}

impl<C: Clock> ClientLimiter<C> {
    pub fn with_clock(requests: u32, clock: C) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::new(window_quota(burst), DefaultKeyedStateStore::default(), clock),
        }
    }

    /// `Err` carries how long the client must wait.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(&client)
            .map_err(|not_until| not_until.wait_time_from(self.limiter.clock().now()))
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Drop state for clients whose quota has fully replenished.
    pub fn evict_idle(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

pub fn spawn_eviction(limiter: Arc<ClientLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            limiter.evict_idle();
            debug!(clients = limiter.tracked_clients(), "rate limiter swept");
        }
    })
}

/// Whole seconds, rounded up, never below 1.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

pub async fn limit_by_client(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(wait) = state.limiter.check(peer.ip()) {
        let retry_after_secs = retry_after_secs(wait);
        warn!(client = %peer.ip(), retry_after_secs, "rate limit exceeded");
        return Err(ApiError::RateLimited { retry_after_secs });
    }
    Ok(next.run(request).await)
}
