use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::services::AppState;

const RATE_LIMIT_PER_USER: u32 = 100; // requests per minute
const RATE_LIMIT_PER_IP: u32 = 200; // requests per minute
const RATE_WINDOW_SECONDS: u64 = 60;

// Proctored password attempts get a much tighter limit.
const PASSWORD_RATE_LIMIT: u32 = 10; // attempts per 5 minutes
const PASSWORD_RATE_WINDOW_SECONDS: u64 = 300;

fn extract_client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // Preferred order: X-Forwarded-For, X-Real-IP, ConnectInfo
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        // may be a comma separated list; take the first hop
        return value.split(',').next().unwrap_or(value).trim().to_string();
    }

    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return value.trim().to_string();
    }

    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

fn env_limit(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(default)
}

/// General API limiter: per identity when one is present, always per IP.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if rate_limit_disabled() {
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip(request.headers(), request.extensions());
    let user_id = request
        .extensions()
        .get::<super::auth::IdentityClaims>()
        .map(|claims| claims.sub.clone());

    if let Some(uid) = &user_id {
        let user_limit = env_limit("RATE_LIMIT_PER_USER", RATE_LIMIT_PER_USER);
        if !check_rate_limit(
            &state,
            &format!("ratelimit:user:{}", uid),
            user_limit,
            RATE_WINDOW_SECONDS,
        )
        .await
        {
            tracing::warn!("Rate limit exceeded for user: {}", uid);
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    let ip_limit = env_limit("RATE_LIMIT_PER_IP", RATE_LIMIT_PER_IP);
    if !check_rate_limit(
        &state,
        &format!("ratelimit:ip:{}", client_ip),
        ip_limit,
        RATE_WINDOW_SECONDS,
    )
    .await
    {
        tracing::warn!("Rate limit exceeded for IP: {}", client_ip);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(request).await)
}

/// Limiter for proctored password attempts: keyed on IP and request path so
/// one client cannot grind one test's password.
pub async fn password_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if rate_limit_disabled() {
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip(request.headers(), request.extensions());
    let key = format!("ratelimit:password:{}:{}", client_ip, request.uri().path());

    if !check_rate_limit(&state, &key, PASSWORD_RATE_LIMIT, PASSWORD_RATE_WINDOW_SECONDS).await {
        tracing::warn!("Password attempt limit exceeded: ip={}", client_ip);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(request).await)
}

/// Sliding window via INCR + EXPIRE. An unreachable Redis fails open: rate
/// limiting is protective, not load-bearing.
async fn check_rate_limit(state: &AppState, key: &str, limit: u32, window_seconds: u64) -> bool {
    let mut conn = match state.redis().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Rate limit check skipped, Redis unavailable: {}", e);
            return true;
        }
    };

    let count: u32 = match redis::cmd("INCR").arg(key).query_async(&mut conn).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("Rate limit INCR failed: {}", e);
            return true;
        }
    };

    if count == 1 {
        if let Err(e) = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_seconds)
            .query_async::<()>(&mut conn)
            .await
        {
            tracing::warn!("Rate limit EXPIRE failed: {}", e);
        }
    }

    count <= limit
}
