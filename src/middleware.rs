//! Security middleware for rate limiting and response headers

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde_json::json;

// ============================================================================
// Rate Limiting
// ============================================================================

/// Rate limit configuration
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Requests per second for general API
    pub general_rps: u32,
    /// Requests per minute for auth endpoints
    pub auth_rpm: u32,
    /// Requests per hour for registration
    pub register_rph: u32,
    /// Requests per minute for posting content
    pub post_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_rps: 100,    // 100 requests/second general
            auth_rpm: 10,        // 10 login attempts/minute
            register_rph: 10,    // 10 registrations/hour per IP
            post_rpm: 20,        // 20 doubts/answers/comments per minute
        }
    }
}

/// Per-IP rate limit state
pub struct RateLimitState {
    /// General API limiter
    pub general: RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
    /// Per-IP limiters
    pub per_ip: DashMap<IpAddr, IpLimiters>,
}

pub struct IpLimiters {
    pub auth: RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
    pub register: RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
    pub post: RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
    pub last_seen: std::time::Instant,
}

impl RateLimitState {
    pub fn new(config: &RateLimitConfig) -> Self {
        let general_quota = Quota::per_second(std::num::NonZeroU32::new(config.general_rps).unwrap());

        Self {
            general: RateLimiter::direct(general_quota),
            per_ip: DashMap::new(),
        }
    }

    pub fn get_ip_limiters(&self, ip: IpAddr, config: &RateLimitConfig) -> dashmap::mapref::one::RefMut<'_, IpAddr, IpLimiters> {
        self.per_ip.entry(ip).or_insert_with(|| {
            let auth_quota = Quota::per_minute(std::num::NonZeroU32::new(config.auth_rpm).unwrap());
            let register_quota = Quota::per_hour(std::num::NonZeroU32::new(config.register_rph).unwrap());
            let post_quota = Quota::per_minute(std::num::NonZeroU32::new(config.post_rpm).unwrap());

            IpLimiters {
                auth: RateLimiter::direct(auth_quota),
                register: RateLimiter::direct(register_quota),
                post: RateLimiter::direct(post_quota),
                last_seen: std::time::Instant::now(),
            }
        })
    }
}

/// Extract client IP from request
fn get_client_ip(request: &Request) -> Option<IpAddr> {
    // Check X-Forwarded-For header first (for proxied requests)
    if let Some(forwarded) = request.headers().get("X-Forwarded-For") {
        if let Ok(s) = forwarded.to_str() {
            if let Some(first_ip) = s.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    // Check X-Real-IP
    if let Some(real_ip) = request.headers().get("X-Real-IP") {
        if let Ok(s) = real_ip.to_str() {
            if let Ok(ip) = s.parse() {
                return Some(ip);
            }
        }
    }

    None
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(rate_state): State<Arc<RateLimitState>>,
    request: Request,
    next: Next,
) -> Response {
    let config = RateLimitConfig::default();
    let path = request.uri().path();
    let method = request.method().clone();

    // Check global rate limit first
    if rate_state.general.check().is_err() {
        return rate_limit_response("Too many requests - server is busy");
    }

    // Get client IP for per-IP limiting
    let client_ip = get_client_ip(&request).unwrap_or_else(|| {
        // Default to localhost if we can't determine IP
        "127.0.0.1".parse().unwrap()
    });

    // Apply endpoint-specific rate limits
    let limiters = rate_state.get_ip_limiters(client_ip, &config);

    // Auth endpoints (login)
    if path.starts_with("/api/auth/login") && method == Method::POST {
        if limiters.auth.check().is_err() {
            drop(limiters);
            return rate_limit_response("Too many login attempts. Please wait a minute.");
        }
    }

    // Registration endpoint
    if path.starts_with("/api/auth/register") && method == Method::POST {
        if limiters.register.check().is_err() {
            drop(limiters);
            return rate_limit_response("Registration rate limit exceeded. Please try again later.");
        }
    }

    // Content creation endpoints
    let is_content_post = path.starts_with("/api/doubts") || path.starts_with("/api/answers");
    if is_content_post && method == Method::POST {
        if limiters.post.check().is_err() {
            drop(limiters);
            return rate_limit_response("Too many posts. Please slow down.");
        }
    }

    drop(limiters);
    next.run(request).await
}

fn rate_limit_response(message: &str) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": message,
            "code": "RATE_LIMITED"
        }))
    ).into_response()
}

// ============================================================================
// Security Headers
// ============================================================================

/// Add security headers to all responses
pub async fn security_headers(
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // Prevent clickjacking
    headers.insert(
        "X-Frame-Options",
        "SAMEORIGIN".parse().unwrap()
    );

    // Prevent MIME type sniffing
    headers.insert(
        "X-Content-Type-Options",
        "nosniff".parse().unwrap()
    );

    // Enable XSS filter
    headers.insert(
        "X-XSS-Protection",
        "1; mode=block".parse().unwrap()
    );

    // Referrer policy
    headers.insert(
        "Referrer-Policy",
        "strict-origin-when-cross-origin".parse().unwrap()
    );

    response
}
