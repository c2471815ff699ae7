use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::{convert::Infallible, net::SocketAddr};

const UNKNOWN_CLIENT: &str = "unknown";

/// Identity used as the rate-limiting key for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(extract_identifier(&parts.headers, peer))
    }
}

/// Picks the client identity in order of preference:
/// first `X-Forwarded-For` entry, `X-Real-IP`, the peer address, `"unknown"`.
pub fn extract_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientId {
    if let Some(forwarded_for) = headers.get("x-forwarded-for")
        && let Ok(forwarded_str) = forwarded_for.to_str()
        && let Some(first_ip) = forwarded_str.split(',').map(str::trim).find(|s| !s.is_empty())
    {
        return ClientId(first_ip.to_string());
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(ip_str) = real_ip.to_str()
        && !ip_str.trim().is_empty()
    {
        return ClientId(ip_str.trim().to_string());
    }

    match peer {
        Some(addr) => ClientId(addr.ip().to_string()),
        None => ClientId(UNKNOWN_CLIENT.to_string()),
    }
}
