//! Per-client admission in front of every route.
//!
//! The limiter itself lives in `gomen_core`; this layer only derives the
//! client key from the request and turns a rejection into a 429.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let key = client_key(peer, request.headers(), &state.config.rate_limit);

    state.rate_limiter.check(&key, Instant::now())?;
    Ok(next.run(request).await)
}

/// Identifies the client for rate limiting.
///
/// The connection's peer address is the key. Only when that peer is a
/// configured trusted proxy are the first `X-Forwarded-For` hop and then
/// `X-Real-IP` used instead.
pub fn client_key(peer: Option<IpAddr>, headers: &HeaderMap, config: &RateLimitConfig) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };

    if config.trusts(peer) {
        if let Some(ip) = forwarded_ip(headers) {
            return ip.to_string();
        }
    }

    peer.to_string()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<&str> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const PROXY: [u8; 4] = [10, 0, 0, 1];
    const CLIENT: [u8; 4] = [192, 168, 1, 20];

    fn behind_proxy() -> RateLimitConfig {
        RateLimitConfig {
            trusted_proxies: vec![IpAddr::from(PROXY)],
            ..RateLimitConfig::default()
        }
    }

    fn forwarded(xff: Option<&'static str>, real_ip: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = xff {
            headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        }
        if let Some(value) = real_ip {
            headers.insert("x-real-ip", HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn trusted_proxy_uses_first_forwarded_hop() {
        let headers = forwarded(Some("203.0.113.7, 10.0.0.1"), Some("198.51.100.2"));
        let key = client_key(Some(IpAddr::from(PROXY)), &headers, &behind_proxy());
        assert_eq!(key, "203.0.113.7");
    }

    #[test]
    fn trusted_proxy_falls_back_to_real_ip() {
        let headers = forwarded(None, Some("198.51.100.2"));
        let key = client_key(Some(IpAddr::from(PROXY)), &headers, &behind_proxy());
        assert_eq!(key, "198.51.100.2");
    }

    #[test]
    fn trusted_proxy_without_headers_is_keyed_by_itself() {
        let headers = forwarded(Some(" "), None);
        let key = client_key(Some(IpAddr::from(PROXY)), &headers, &behind_proxy());
        assert_eq!(key, "10.0.0.1");
    }

    #[test]
    fn untrusted_peer_cannot_choose_its_key() {
        let headers = forwarded(Some("203.0.113.7"), Some("198.51.100.2"));

        let key = client_key(Some(IpAddr::from(CLIENT)), &headers, &behind_proxy());
        assert_eq!(key, "192.168.1.20");

        let key = client_key(Some(IpAddr::from(CLIENT)), &headers, &RateLimitConfig::default());
        assert_eq!(key, "192.168.1.20");
    }

    #[test]
    fn unknown_without_peer() {
        let headers = forwarded(Some("203.0.113.7"), None);
        assert_eq!(client_key(None, &headers, &behind_proxy()), "unknown");
    }
}
