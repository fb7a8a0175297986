use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP address.
///
/// State lives in process memory: counters are lost on restart and are
/// not shared between replicas.
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Number of requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub attempts: u32,
    pub window_seconds: u64,
}

impl RateLimitPolicy {
    /// Sign-in style endpoints: 5 requests per minute.
    pub const AUTH: RateLimitPolicy = RateLimitPolicy {
        attempts: 5,
        window_seconds: 60,
    };

    /// General API traffic: 60 requests per minute.
    pub const API: RateLimitPolicy = RateLimitPolicy {
        attempts: 60,
        window_seconds: 60,
    };

    pub fn new(attempts: u32, window_seconds: u64) -> Self {
        Self {
            attempts,
            window_seconds,
        }
    }

    fn quota(&self) -> Quota {
        let attempts = NonZeroU32::new(self.attempts).unwrap_or(NonZeroU32::MIN);
        let window_ms = self.window_seconds.max(1) * 1000;
        let period = Duration::from_millis((window_ms / u64::from(attempts.get())).max(1));
        // `period` is never zero, so `with_period` always yields a quota.
        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(attempts)
    }
}

/// Create a keyed rate limiter (by IP)
pub fn create_ip_rate_limiter(policy: RateLimitPolicy) -> IpRateLimiter {
    Arc::new(RateLimiter::dashmap(policy.quota()))
}

/// Resolve the caller's address: proxy headers first, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).or(peer.map(|addr| addr.ip()))
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match client_ip(request.headers(), peer) {
        Some(ip) => match limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                tracing::warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    format!(
                        "Rate limit exceeded. Try again in {} seconds.",
                        wait_time.as_secs().max(1)
                    ),
                    Some(wait_time.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
