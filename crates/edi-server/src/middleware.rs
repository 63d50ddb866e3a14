//! The request pipeline, outermost first: request id, partner context, panic
//! recovery, access log, security headers, then per-route timeout, bulkhead,
//! rate limit and (ingest only) circuit breaker.

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use edi_pipeline::{Error, ErrorKind};
use futures::FutureExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, REQUEST_ID, current_request_id};
use crate::resilience::{Admission, CircuitBreaker, RateLimit};
use crate::state::AppState;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_PARTNER_ID: HeaderName = HeaderName::from_static("x-partner-id");

/// Partner named by `X-Partner-ID`, or by the `partner_id` query parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnerContext(pub Option<String>);

impl PartnerContext {
    pub fn partner_id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Adopt `X-Request-ID` or mint one, and echo it on the response.
pub async fn request_id(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut response = REQUEST_ID.scope(id.clone(), next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

pub async fn partner_context(mut request: Request, next: Next) -> Response {
    let from_header = request
        .headers()
        .get(X_PARTNER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let partner_id = from_header.or_else(|| {
        Query::<HashMap<String, String>>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(mut params)| params.remove("partner_id"))
            .filter(|v| !v.trim().is_empty())
    });

    request.extensions_mut().insert(PartnerContext(partner_id));
    next.run(request).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Turn a panicking handler into a sanitized 500.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => ApiError(Error::internal(format!("handler panicked: {}", panic_message(panic.as_ref()))))
            .into_response(),
    }
}

pub async fn access_log(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        remote = remote.as_deref().unwrap_or("-"),
        request_id = %current_request_id(),
        "request completed"
    );
    response
}

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));

    let is_json = headers
        .get(CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"application/json"));
    if is_json {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
    }
    response
}

/// Drop the endpoint when it outlives the request timeout.
pub async fn enforce_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match tokio::time::timeout(state.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                request_id = %current_request_id(),
                timeout_ms = state.request_timeout.as_millis() as u64,
                "request timed out"
            );
            ApiError(Error::unavailable("request timed out")).into_response()
        }
    }
}

pub async fn bulkhead(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(_permit) = state.bulkhead.try_acquire() else {
        warn!(capacity = state.bulkhead.capacity(), "bulkhead full, request refused");
        return ApiError(Error::unavailable("server is at capacity, retry later")).into_response();
    };
    next.run(request).await
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let partner_id = request
        .extensions()
        .get::<PartnerContext>()
        .and_then(|p| p.partner_id().map(str::to_string));
    let key = state.limiter.key(partner_id.as_deref());

    let mut limit = None;
    if let Some(partner_id) = partner_id.as_deref() {
        if state.limiter.per_partner() && !state.limiter.contains(&key) {
            limit = partner_override(&state, partner_id).await;
        }
    }

    if !state.limiter.check(&key, limit) {
        debug!(key = %key, "rate limit exceeded");
        return ApiError(Error::RateLimit("rate limit exceeded".to_string())).into_response();
    }
    next.run(request).await
}

async fn partner_override(state: &AppState, partner_id: &str) -> Option<RateLimit> {
    let profile = state.profiles.get(partner_id).await.ok()?;
    profile.configuration.rate_limit.map(RateLimit::from)
}

/// Records the outcome when dropped; a cancelled request counts as a failure.
struct BreakerCall<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    success: bool,
}

impl Drop for BreakerCall<'_> {
    fn drop(&mut self) {
        self.breaker.record(self.admission, self.success);
    }
}

/// Only `Unavailable` and `Internal` responses count against the breaker.
pub async fn circuit_breaker(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(admission) = state.breaker.allow() else {
        return ApiError(Error::unavailable("service temporarily unavailable, circuit open")).into_response();
    };
    let mut call = BreakerCall {
        breaker: &state.breaker,
        admission,
        success: false,
    };

    let response = next.run(request).await;
    call.success = !matches!(
        response.extensions().get::<ErrorKind>(),
        Some(ErrorKind::Unavailable | ErrorKind::Internal)
    );
    response
}
