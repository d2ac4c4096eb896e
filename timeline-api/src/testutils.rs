use http::{HeaderValue, Request};
use std::sync::Arc;
use std::time::Duration;
use timeline::allow_list::AllowList;
use timeline::cache::MemoryStore;
use timeline::config::RepoConfig;
use timeline::source::ApiSource;
use timeline::testutils::FakeFetcher;
use timeline::types::TimeRange;

use crate::config::Environment;
use crate::guard::{OriginPolicy, RequestGuard};
use crate::handler::{Defaults, TimelineHandler};
use crate::rate_limit::RateLimiter;

pub fn test_repositories() -> Vec<RepoConfig> {
    let mut website = RepoConfig::new("octo", "website", "#4f46e5");
    website.display_name = Some("Website".into());
    vec![website, RepoConfig::new("octo", "api", "#16a34a")]
}

/// Handler over the live-API source with an in-memory cache. Only
/// `https://example.com` is an allowed origin.
pub fn test_handler(
    fetcher: FakeFetcher,
    environment: Environment,
    max_requests: u32,
) -> (TimelineHandler, Arc<FakeFetcher>) {
    let fetcher = Arc::new(fetcher);
    let guard = RequestGuard::new(
        environment,
        OriginPolicy::new(&["https://example.com".into()]),
        Arc::new(RateLimiter::new(max_requests, Duration::from_secs(60))),
        "cf-connecting-ip",
    );
    let handler = TimelineHandler::new(
        "/api/github/timeline",
        guard,
        AllowList::new(test_repositories()),
        Arc::new(ApiSource::new(fetcher.clone(), Duration::from_secs(5))),
        Arc::new(MemoryStore::new(100)),
        Defaults {
            period: TimeRange::ThirtyDays,
            locale: "en".into(),
        },
    );
    (handler, fetcher)
}

pub fn with_origin(mut request: Request<()>, origin: &'static str) -> Request<()> {
    request
        .headers_mut()
        .insert(http::header::ORIGIN, HeaderValue::from_static(origin));
    request
}
