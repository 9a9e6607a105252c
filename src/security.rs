use crate::{config::Limits, errors::AppError};
use axum::http::HeaderMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

pub fn require_bearer(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let token = extract_bearer(headers).ok_or(AppError::Unauthorized)?;
    if token != expected {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

pub fn check_origin(headers: &HeaderMap, allowed: &[String]) -> Result<(), AppError> {
    let origin = headers
        .get("Origin")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::OriginDenied)?;
    if allowed.iter().any(|o| o == origin) {
        Ok(())
    } else {
        Err(AppError::OriginDenied)
    }
}

pub fn content_length_ok(headers: &HeaderMap, max_kb: usize) -> Result<(), AppError> {
    if let Some(len) = headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if len > max_kb * 1024 {
            return Err(AppError::RequestTooLarge);
        }
    }
    Ok(())
}

/// Process-wide request budget for the HTTP transport.
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl Throttle {
    pub fn new(limits: &Limits) -> Self {
        let rps = NonZeroU32::new(limits.requests_per_second).unwrap_or(nonzero!(1u32));
        let burst = NonZeroU32::new(limits.burst).unwrap_or(rps);
        Self { limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps).allow_burst(burst))) }
    }

    pub fn check(&self) -> Result<(), AppError> {
        self.limiter.check().map_err(|_| AppError::RateLimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_enforced() {
        let mut h = HeaderMap::new();
        h.insert("Origin", "https://good.example".parse().unwrap());
        assert!(check_origin(&h, &["https://good.example".into()]).is_ok());
        assert!(check_origin(&h, &["https://bad.example".into()]).is_err());
    }

    #[test]
    fn bearer_required() {
        let mut h = HeaderMap::new();
        assert!(require_bearer(&h, "token").is_err());
        h.insert(axum::http::header::AUTHORIZATION, "Bearer token".parse().unwrap());
        assert!(require_bearer(&h, "token").is_ok());
        assert!(require_bearer(&h, "wrong").is_err());
    }

    #[test]
    fn oversized_bodies_rejected() {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::CONTENT_LENGTH, "4096".parse().unwrap());
        assert!(content_length_ok(&h, 4).is_ok());
        assert!(content_length_ok(&h, 3).is_err());
    }

    #[test]
    fn throttle_exhausts_burst() {
        let limits = Limits { requests_per_second: 1, burst: 2, ..Limits::default() };
        let t = Throttle::new(&limits);
        assert!(t.check().is_ok());
        assert!(t.check().is_ok());
        assert!(matches!(t.check(), Err(AppError::RateLimited)));
    }
}
