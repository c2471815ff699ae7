use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::debug;
use vidgrab_core::RateLimiter;

use crate::client::extract_identifier;

/// Reports the caller's standing against its rate limit on every response.
///
/// Admission itself happens inside the download pipeline, after the request
/// body has been validated; this layer only decorates the response.
pub async fn rate_limit_headers_middleware(
    State(rate_limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identifier = extract_identifier(request.headers(), peer);

    let mut response = next.run(request).await;
    let usage = rate_limiter.usage(identifier.as_str());
    debug!(
        "Client '{}' has used {}/{} requests",
        identifier.as_str(),
        usage,
        rate_limiter.max_requests_per_client()
    );
    add_rate_limit_headers(&mut response, usage, &rate_limiter);
    response
}

pub fn add_rate_limit_headers(response: &mut Response, current_usage: usize, rate_limiter: &RateLimiter) {
    let headers = response.headers_mut();
    let limit = rate_limiter.max_requests_per_client();

    headers.insert("X-RateLimit-Used", HeaderValue::from(current_usage));
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from(limit.saturating_sub(current_usage)),
    );
    headers.insert(
        "X-RateLimit-Window",
        HeaderValue::from(rate_limiter.window().as_secs()),
    );
}
