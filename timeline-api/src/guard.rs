//! Admission checks that run before any cache or upstream work.

use http::HeaderMap;
use http::header::{ORIGIN, REFERER};
use shared::counter;
use std::sync::Arc;

use crate::config::Environment;
use crate::errors::TimelineApiError;
use crate::metrics_defs::{ORIGIN_REJECTED, RATE_LIMITED};
use crate::rate_limit::{RateLimitDecision, RateLimiter};

/// Bucket shared by all clients without any forwarding header.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limit key for a request: the trusted proxy header, then the first
/// `x-forwarded-for` entry, then `x-real-ip`.
pub fn client_identity(headers: &HeaderMap, trusted_header: &str) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header(trusted_header)
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .or_else(|| header("x-real-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Allowed `scheme://host[:port]` prefixes for `Origin` / `Referer`.
#[derive(Clone, Debug)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: &[String]) -> Self {
        OriginPolicy {
            allowed: allowed
                .iter()
                .map(|origin| origin.trim_end_matches('/').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Checks `Origin`, falling back to `Referer`. A request carrying neither
    /// is rejected.
    pub fn is_allowed(&self, headers: &HeaderMap) -> bool {
        headers
            .get(ORIGIN)
            .or_else(|| headers.get(REFERER))
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| self.matches(value))
    }

    fn matches(&self, value: &str) -> bool {
        let value = value.to_ascii_lowercase();
        self.allowed.iter().any(|prefix| {
            value.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with(['/', '?', '#'])
            })
        })
    }
}

pub struct RequestGuard {
    environment: Environment,
    origins: OriginPolicy,
    limiter: Arc<RateLimiter>,
    trusted_header: String,
}

impl RequestGuard {
    pub fn new(
        environment: Environment,
        origins: OriginPolicy,
        limiter: Arc<RateLimiter>,
        trusted_header: impl Into<String>,
    ) -> Self {
        RequestGuard {
            environment,
            origins,
            limiter,
            trusted_header: trusted_header.into(),
        }
    }

    /// Origin check (production only), then rate limit. Rejected origins do
    /// not consume the client's budget.
    pub fn admit(&self, headers: &HeaderMap) -> Result<RateLimitDecision, TimelineApiError> {
        if self.environment == Environment::Production && !self.origins.is_allowed(headers) {
            counter!(ORIGIN_REJECTED).increment(1);
            let origin = headers
                .get(ORIGIN)
                .or_else(|| headers.get(REFERER))
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            tracing::debug!(origin, "rejected request origin");
            return Err(TimelineApiError::OriginNotAllowed(origin.to_string()));
        }

        let identity = client_identity(headers, &self.trusted_header);
        let decision = self.limiter.check(&identity);
        if !decision.allowed {
            counter!(RATE_LIMITED).increment(1);
            tracing::debug!(client = %identity, "rate limited");
            return Err(TimelineApiError::RateLimited(decision));
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use std::time::Duration;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_client_identity_priority() {
        let all = headers(&[
            ("cf-connecting-ip", "1.1.1.1"),
            ("x-forwarded-for", "2.2.2.2, 10.0.0.1"),
            ("x-real-ip", "3.3.3.3"),
        ]);
        assert_eq!(client_identity(&all, "cf-connecting-ip"), "1.1.1.1");
        assert_eq!(client_identity(&all, "fly-client-ip"), "2.2.2.2");

        let real_ip = headers(&[("x-real-ip", "3.3.3.3")]);
        assert_eq!(client_identity(&real_ip, "cf-connecting-ip"), "3.3.3.3");

        let blank = headers(&[("x-forwarded-for", " , 4.4.4.4")]);
        assert_eq!(client_identity(&blank, "cf-connecting-ip"), UNKNOWN_CLIENT);
        assert_eq!(client_identity(&HeaderMap::new(), "cf-connecting-ip"), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_origin_prefix_boundary() {
        let policy = OriginPolicy::new(&["https://example.com/".into(), "http://localhost:4321".into()]);

        assert!(policy.is_allowed(&headers(&[("origin", "https://example.com")])));
        assert!(policy.is_allowed(&headers(&[("origin", "HTTPS://Example.com")])));
        assert!(policy.is_allowed(&headers(&[("referer", "https://example.com/projects?x=1")])));
        assert!(policy.is_allowed(&headers(&[("referer", "http://localhost:4321#top")])));

        assert!(!policy.is_allowed(&headers(&[("origin", "https://example.com.evil.net")])));
        assert!(!policy.is_allowed(&headers(&[("origin", "https://example.community")])));
        assert!(!policy.is_allowed(&headers(&[("origin", "http://localhost:43210")])));
        assert!(!policy.is_allowed(&HeaderMap::new()));
    }

    #[test]
    fn test_origin_is_checked_before_rate_limit() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let guard = RequestGuard::new(
            Environment::Production,
            OriginPolicy::new(&["https://example.com".into()]),
            limiter.clone(),
            "cf-connecting-ip",
        );

        let evil = headers(&[("origin", "https://evil.net"), ("cf-connecting-ip", "1.1.1.1")]);
        for _ in 0..3 {
            assert!(matches!(
                guard.admit(&evil),
                Err(TimelineApiError::OriginNotAllowed(_))
            ));
        }

        let good = headers(&[("origin", "https://example.com"), ("cf-connecting-ip", "1.1.1.1")]);
        assert_eq!(guard.admit(&good).unwrap().remaining, 0);
        assert!(matches!(
            guard.admit(&good),
            Err(TimelineApiError::RateLimited(RateLimitDecision { allowed: false, .. }))
        ));
    }

    #[test]
    fn test_development_skips_origin_check() {
        let guard = RequestGuard::new(
            Environment::Development,
            OriginPolicy::new(&[]),
            Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
            "cf-connecting-ip",
        );
        assert_eq!(guard.admit(&HeaderMap::new()).unwrap().remaining, 9);
    }
}
