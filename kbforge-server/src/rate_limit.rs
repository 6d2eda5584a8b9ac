//! Per-source-address rate limiting for `search`-class endpoints.
//!
//! A single global `governor::RateLimiter<NotKeyed, ..>` bucket caps total
//! traffic rather than any one caller. Since the limit here is explicitly
//! per source address, this uses a `DashMap` keyed by `IpAddr` instead,
//! each entry holding its own fixed-window counter.

use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_period: u32,
    pub period: Duration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn per_minute(requests: u32) -> Self {
        Self {
            requests_per_period: requests,
            period: Duration::from_secs(60),
        }
    }
}

struct Window {
    count: u32,
    started_at: Instant,
}

/// Fixed-window per-IP limiter. A caller gets `requests_per_period` calls
/// within each rolling `period`-sized window before being refused; the
/// window resets to a fresh count once it elapses rather than sliding.
pub struct PerIpRateLimiter {
    config: RateLimitConfig,
    windows: DashMap<IpAddr, Window>,
}

impl PerIpRateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    fn check(&self, addr: IpAddr) -> bool {
        let mut entry = self.windows.entry(addr).or_insert_with(|| Window {
            count: 0,
            started_at: Instant::now(),
        });
        if entry.started_at.elapsed() >= self.config.period {
            entry.count = 0;
            entry.started_at = Instant::now();
        }
        if entry.count >= self.config.requests_per_period {
            return false;
        }
        entry.count += 1;
        true
    }
}

pub async fn rate_limit_middleware(
    limiter: Arc<PerIpRateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check(addr.ip()) {
        next.run(request).await
    } else {
        (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded, try again later").into_response()
    }
}

pub trait RateLimitExt {
    #[must_use]
    fn with_rate_limit(self, limiter: Arc<PerIpRateLimiter>) -> Self;
}

impl<S> RateLimitExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_rate_limit(self, limiter: Arc<PerIpRateLimiter>) -> Self {
        self.layer(axum::middleware::from_fn(move |connect_info, request, next| {
            rate_limit_middleware(limiter.clone(), connect_info, request, next)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_configured_count_then_blocks() {
        let limiter = PerIpRateLimiter::new(RateLimitConfig::per_minute(2));
        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check(addr));
        assert!(limiter.check(addr));
        assert!(!limiter.check(addr));
    }

    #[test]
    fn different_addresses_get_independent_windows() {
        let limiter = PerIpRateLimiter::new(RateLimitConfig::per_minute(1));
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
    }
}
