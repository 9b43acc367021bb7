//! Per-client fixed-window rate limiting.
//!
//! Each (client IP, tier) pair gets a request budget that refills in full at
//! the start of every window. Login attempts have their own, much smaller
//! budget.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiError;
use crate::config::RateLimitConfig;
use crate::AppState;

/// Rate limit tier for different endpoint types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// All API endpoints (300 req/min default)
    Api,
    /// Login endpoint (5 per 15 min default)
    Login,
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    /// Requests used in the current window
    used: u32,
    window_start: Instant,
}

/// Thread-safe rate limiter using dashmap
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<(IpAddr, RateLimitTier), RateLimitEntry>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Count a request against the client's budget.
    /// Returns Err(retry_after_seconds) once the budget is spent.
    pub fn check_rate_limit(&self, ip: IpAddr, tier: RateLimitTier) -> Result<RateLimitInfo, u64> {
        self.check_at(ip, tier, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, tier: RateLimitTier, now: Instant) -> Result<RateLimitInfo, u64> {
        if !self.config.enabled {
            return Ok(RateLimitInfo {
                remaining: u32::MAX,
                limit: u32::MAX,
                reset_after: 0,
            });
        }

        let (limit, window) = self.budget(tier);
        let mut entry = self.entries.entry((ip, tier)).or_insert_with(|| RateLimitEntry {
            used: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.used = 0;
            entry.window_start = now;
        }

        let reset_after = window
            .saturating_sub(now.duration_since(entry.window_start))
            .as_secs()
            .max(1);

        if entry.used >= limit {
            return Err(reset_after);
        }

        entry.used += 1;
        Ok(RateLimitInfo {
            remaining: limit - entry.used,
            limit,
            reset_after,
        })
    }

    fn budget(&self, tier: RateLimitTier) -> (u32, Duration) {
        match tier {
            RateLimitTier::Api => (
                self.config.api_requests_per_window,
                Duration::from_secs(self.config.api_window_seconds),
            ),
            RateLimitTier::Login => (
                self.config.login_requests_per_window,
                Duration::from_secs(self.config.login_window_seconds),
            ),
        }
    }

    /// Drop entries whose window has long passed
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let longest = Duration::from_secs(
            self.config
                .api_window_seconds
                .max(self.config.login_window_seconds),
        );
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < longest * 2);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Information about rate limit status
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    /// Seconds until the window resets
    pub reset_after: u64,
}

/// Client IP: the socket peer, or with `trust_proxy` set, X-Forwarded-For
/// then X-Real-IP before the peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }

    peer.map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
}

pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(state, request, next, RateLimitTier::Api).await
}

pub async fn rate_limit_login(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(state, request, next, RateLimitTier::Login).await
}

async fn rate_limit_with_tier(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, state.config.rate_limit.trust_proxy_headers);

    match state.rate_limiter.check_rate_limit(ip, tier) {
        Ok(info) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset_after));
            response
        }
        Err(retry_after) => {
            tracing::warn!(%ip, ?tier, retry_after, "Rate limit exceeded");
            let message = match tier {
                RateLimitTier::Login => "Muitas tentativas de login. Tente novamente em 15 minutos.".to_string(),
                RateLimitTier::Api => format!("Demasiados pedidos. Tente novamente em {} segundos.", retry_after),
            };
            let mut response = ApiError::rate_limited(message).into_response();
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Spawn a background task to periodically clean up expired rate limit entries
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} entries remaining",
                rate_limiter.entry_count()
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            login_requests_per_window: 5,
            login_window_seconds: 900,
            api_requests_per_window: 10,
            api_window_seconds: 60,
            cleanup_interval: 300,
            trust_proxy_headers: false,
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    #[test]
    fn test_login_allows_five_then_blocks() {
        let limiter = RateLimiter::new(test_config());

        for i in 0..5 {
            assert!(
                limiter.check_rate_limit(ip(1), RateLimitTier::Login).is_ok(),
                "Attempt {} should be allowed",
                i
            );
        }

        let retry_after = limiter.check_rate_limit(ip(1), RateLimitTier::Login).unwrap_err();
        assert!(retry_after > 0 && retry_after <= 900);
    }

    #[test]
    fn test_window_refills_after_expiry() {
        let limiter = RateLimiter::new(test_config());
        let start = Instant::now();

        for _ in 0..5 {
            limiter.check_at(ip(1), RateLimitTier::Login, start).unwrap();
        }
        assert!(limiter.check_at(ip(1), RateLimitTier::Login, start).is_err());

        let later = start + Duration::from_secs(901);
        let info = limiter.check_at(ip(1), RateLimitTier::Login, later).unwrap();
        assert_eq!(info.remaining, 4);
    }

    #[test]
    fn test_different_ips_have_separate_limits() {
        let limiter = RateLimiter::new(test_config());

        for _ in 0..10 {
            let _ = limiter.check_rate_limit(ip(1), RateLimitTier::Api);
        }

        assert!(limiter.check_rate_limit(ip(1), RateLimitTier::Api).is_err());
        assert!(limiter.check_rate_limit(ip(2), RateLimitTier::Api).is_ok());
    }

    #[test]
    fn test_tiers_are_independent() {
        let limiter = RateLimiter::new(test_config());

        for _ in 0..5 {
            let _ = limiter.check_rate_limit(ip(1), RateLimitTier::Login);
        }

        assert!(limiter.check_rate_limit(ip(1), RateLimitTier::Login).is_err());
        assert!(limiter.check_rate_limit(ip(1), RateLimitTier::Api).is_ok());
    }

    #[test]
    fn test_disabled_rate_limiting() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);

        for _ in 0..100 {
            assert!(limiter.check_rate_limit(ip(1), RateLimitTier::Login).is_ok());
        }
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let limiter = RateLimiter::new(test_config());
        let _ = limiter.check_rate_limit(ip(1), RateLimitTier::Api);

        limiter.cleanup_expired();
        assert_eq!(limiter.entry_count(), 1);
    }

    #[test]
    fn test_client_ip_ignores_proxy_headers_by_default() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("172.16.0.2"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));

        assert_eq!(client_ip(&headers, Some(peer), false), "10.0.0.9".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&headers, None, false), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_client_ip_precedence_behind_proxy() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer), true), "10.0.0.9".parse::<IpAddr>().unwrap());

        headers.insert("x-real-ip", HeaderValue::from_static("172.16.0.2"));
        assert_eq!(client_ip(&headers, Some(peer), true), "172.16.0.2".parse::<IpAddr>().unwrap());

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.7".parse::<IpAddr>().unwrap());
    }
}
