// crates/server/src/middleware.rs
//! Per-client admission in front of the job routes.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

/// Key used when neither a forwarding header nor the peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Headers consulted for the caller's address, most trusted first.
const CLIENT_IP_HEADERS: &[&str] = &[
    "x-forwarded-for",
    "x-real-ip",
    "x-client-ip",
    "cf-connecting-ip",
    "true-client-ip",
];

/// Derive the admission key for a request.
///
/// Forwarding headers win over the socket peer, but only when
/// `trusted_proxies` is empty or contains the peer. Otherwise a direct
/// caller could pick a fresh key per request. Only the first entry of a
/// comma-separated `X-Forwarded-For` is used, and values that do not parse
/// as an IP (optionally with a port) are skipped.
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> String {
    let from_headers = if honors_forwarding(peer, trusted_proxies) {
        CLIENT_IP_HEADERS
            .iter()
            .filter_map(|name| headers.get(*name)?.to_str().ok())
            .find_map(|value| parse_ip(value.split(',').next().unwrap_or_default()))
    } else {
        None
    };

    from_headers
        .or(peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn honors_forwarding(peer: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> bool {
    trusted_proxies.is_empty() || peer.is_some_and(|ip| trusted_proxies.contains(&ip))
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Reject the request with 429 when the caller's bucket is empty.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    // Absent when the router is driven without a socket (tests, oneshot).
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let key = client_key(&headers, peer, &state.trusted_proxies);

    if !state.admission.allow(&key) {
        clipper_core::metrics::record_rate_limited();
        return ApiError::RateLimited(key).into_response();
    }

    next.run(request).await
}
