use chrono::Utc;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response};
use hyper::body::Bytes;
use serde::Serialize;
use shared::histogram;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use timeline::allow_list::{AllowList, cache_key};
use timeline::cache::{CacheStore, with_cache};
use timeline::config::RepoConfig;
use timeline::errors::RepoSelectionError;
use timeline::locale::Locale;
use timeline::source::{TimelineQuery, TimelineSource};
use timeline::types::{MultiRepoTimelinePoint, RepoRef, RepoTimeline, TimeRange};

use crate::errors::{TimelineApiError, add_rate_limit_headers, add_security_headers};
use crate::guard::RequestGuard;
use crate::metrics_defs::REQUEST_DURATION;

/// Served in addition to the configured timeline path.
pub const TIMELINE_ALIAS_PATH: &str = "/timeline";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelineResponse {
    timelines: Vec<RepoTimeline>,
    combined_timeline: Vec<MultiRepoTimelinePoint>,
    available_periods: &'static [TimeRange],
    default_period: TimeRange,
}

/// Parameters applied when a request leaves them out.
#[derive(Clone, Debug)]
pub struct Defaults {
    pub period: TimeRange,
    pub locale: String,
}

/// Serves `GET <timeline path>?repos=..&range=..&locale=..`.
pub struct TimelineHandler {
    paths: Vec<String>,
    guard: RequestGuard,
    allow_list: AllowList,
    source: Arc<dyn TimelineSource>,
    cache: Arc<dyn CacheStore>,
    defaults: Defaults,
}

impl TimelineHandler {
    pub fn new(
        timeline_path: &str,
        guard: RequestGuard,
        allow_list: AllowList,
        source: Arc<dyn TimelineSource>,
        cache: Arc<dyn CacheStore>,
        defaults: Defaults,
    ) -> Self {
        let mut paths = vec![timeline_path.to_string()];
        if timeline_path != TIMELINE_ALIAS_PATH {
            paths.push(TIMELINE_ALIAS_PATH.to_string());
        }

        TimelineHandler {
            paths,
            guard,
            allow_list,
            source,
            cache,
            defaults,
        }
    }

    pub async fn handle(&self, request: Request<()>) -> Response<Bytes> {
        let started = Instant::now();

        let response = match self.route(&request).await {
            Ok(response) => response,
            Err(e) => reject(e),
        };

        let cache = response
            .headers()
            .get("x-cache")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("none")
            .to_string();
        histogram!(
            REQUEST_DURATION,
            "status" => response.status().as_str().to_string(),
            "cache" => cache
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn route(&self, request: &Request<()>) -> Result<Response<Bytes>, TimelineApiError> {
        let path = request.uri().path();
        if !self.paths.iter().any(|served| served == path) {
            return Err(TimelineApiError::NotFound(path.to_string()));
        }
        if request.method() != Method::GET {
            return Err(TimelineApiError::MethodNotAllowed(
                request.method().to_string(),
            ));
        }

        let decision = self.guard.admit(request.headers())?;

        let mut response = match self.serve(request.uri().query()).await {
            Ok(response) => response,
            Err(e) => reject(e),
        };
        add_rate_limit_headers(response.headers_mut(), &decision);
        Ok(response)
    }

    async fn serve(&self, query: Option<&str>) -> Result<Response<Bytes>, TimelineApiError> {
        let params: HashMap<String, String> = query
            .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let range = match params.get("range") {
            Some(raw) => raw
                .parse::<TimeRange>()
                .map_err(|_| TimelineApiError::InvalidRange(raw.clone()))?,
            None => self.defaults.period,
        };

        let repos = self
            .allow_list
            .select(params.get("repos").map(String::as_str))
            .map_err(|e| match e {
                RepoSelectionError::InvalidJson(e) => TimelineApiError::InvalidRepos(e.to_string()),
                RepoSelectionError::NoAllowedRepos => TimelineApiError::NoAllowedRepos,
            })?;

        let locale = Locale::parse(
            params
                .get("locale")
                .map(String::as_str)
                .filter(|locale| !locale.is_empty())
                .unwrap_or(self.defaults.locale.as_str()),
        );

        let refs: Vec<RepoRef> = repos.iter().map(RepoConfig::repo_ref).collect();
        let key = cache_key(&refs, range, &locale.cache_tag());
        let ttl = range.cache_ttl();
        let query = TimelineQuery {
            repos,
            range,
            locale,
            end: Utc::now().date_naive(),
        };

        let cached = with_cache(self.cache.as_ref(), &key, ttl, || {
            self.source.get_timeline(&query)
        })
        .await
        .map_err(|e| TimelineApiError::Internal(e.to_string()))?;

        tracing::debug!(
            key = %key,
            source = self.source.name(),
            hit = cached.from_cache,
            "serving timeline"
        );

        // A hit may have been filled by a request listing the same repositories
        // in another order.
        let mut timelines = cached.data.timelines;
        let order: HashMap<String, usize> = query
            .repos
            .iter()
            .enumerate()
            .map(|(index, repo)| (repo.key(), index))
            .collect();
        timelines.sort_by_key(|timeline| {
            order.get(&timeline.repo_name).copied().unwrap_or(usize::MAX)
        });

        let body = TimelineResponse {
            timelines,
            combined_timeline: cached.data.combined_timeline,
            available_periods: &TimeRange::ALL,
            default_period: self.defaults.period,
        };
        let json =
            serde_json::to_vec(&body).map_err(|e| TimelineApiError::Internal(e.to_string()))?;

        let mut response = Response::new(Bytes::from(json));
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, cache_control(ttl)?);
        headers.insert(
            "x-cache",
            HeaderValue::from_static(if cached.from_cache { "HIT" } else { "MISS" }),
        );
        add_security_headers(headers);
        Ok(response)
    }
}

fn cache_control(ttl: Duration) -> Result<HeaderValue, TimelineApiError> {
    let secs = ttl.as_secs();
    HeaderValue::from_str(&format!(
        "public, s-maxage={secs}, stale-while-revalidate={}",
        secs * 2
    ))
    .map_err(|e| TimelineApiError::Internal(e.to_string()))
}

fn reject(error: TimelineApiError) -> Response<Bytes> {
    if error.status().is_server_error() {
        tracing::error!(error = %error, "timeline request failed");
    } else {
        tracing::debug!(error = %error, code = error.code(), "timeline request rejected");
    }
    error.to_response()
}
