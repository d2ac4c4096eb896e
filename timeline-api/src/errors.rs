use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use hyper::Response;
use hyper::body::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::rate_limit::RateLimitDecision;

/// Errors that can occur while serving the timeline API.
///
/// Clients only ever see [`TimelineApiError::code`] and a fixed message;
/// details stay in the logs.
#[derive(Error, Debug)]
pub enum TimelineApiError {
    #[error("Rate limit exceeded")]
    RateLimited(RateLimitDecision),

    #[error("Origin not allowed: {0}")]
    OriginNotAllowed(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid repos parameter: {0}")]
    InvalidRepos(String),

    #[error("None of the requested repositories are allowed")]
    NoAllowedRepos,

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("No route for path: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    code: &'static str,
}

impl TimelineApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            TimelineApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            TimelineApiError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            TimelineApiError::InvalidRange(_)
            | TimelineApiError::InvalidRepos(_)
            | TimelineApiError::NoAllowedRepos => StatusCode::BAD_REQUEST,
            TimelineApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            TimelineApiError::NotFound(_) => StatusCode::NOT_FOUND,
            TimelineApiError::Internal(_) | TimelineApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine readable code.
    pub fn code(&self) -> &'static str {
        match self {
            TimelineApiError::RateLimited(_) => "rate_limited",
            TimelineApiError::OriginNotAllowed(_) => "origin_not_allowed",
            TimelineApiError::InvalidRange(_) => "invalid_range",
            TimelineApiError::InvalidRepos(_) => "invalid_repos",
            TimelineApiError::NoAllowedRepos => "no_allowed_repos",
            TimelineApiError::MethodNotAllowed(_) => "method_not_allowed",
            TimelineApiError::NotFound(_) => "not_found",
            TimelineApiError::Internal(_) | TimelineApiError::Io(_) => "internal_error",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            TimelineApiError::RateLimited(_) => "Too many requests",
            TimelineApiError::OriginNotAllowed(_) => "Origin not allowed",
            TimelineApiError::InvalidRange(_) => "Invalid range, expected one of 7d, 30d, 6m, 12m",
            TimelineApiError::InvalidRepos(_) => {
                "Invalid repos parameter, expected a JSON array of {owner, name}"
            }
            TimelineApiError::NoAllowedRepos => "None of the requested repositories are allowed",
            TimelineApiError::MethodNotAllowed(_) => "Method not allowed",
            TimelineApiError::NotFound(_) => "Not found",
            TimelineApiError::Internal(_) | TimelineApiError::Io(_) => "Internal server error",
        }
    }

    /// JSON error response. Never cacheable.
    pub fn to_response(&self) -> Response<Bytes> {
        let body = ErrorBody {
            error: self.public_message(),
            code: self.code(),
        };
        let json = serde_json::to_vec(&body).unwrap_or_default();

        let mut response = Response::new(Bytes::from(json));
        *response.status_mut() = self.status();
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        add_security_headers(headers);
        if let TimelineApiError::RateLimited(decision) = self {
            add_rate_limit_headers(headers, decision);
        }
        response
    }
}

pub fn add_security_headers(headers: &mut HeaderMap) {
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
}

/// `X-RateLimit-*` headers, plus `Retry-After` when the request was denied.
pub fn add_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let reset_secs = decision.reset_in.as_secs_f64().ceil() as u64;
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_secs));
    if !decision.allowed {
        headers.insert(http::header::RETRY_AFTER, HeaderValue::from(reset_secs));
    }
}
