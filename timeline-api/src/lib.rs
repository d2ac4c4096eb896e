pub mod config;
pub mod errors;
pub mod guard;
pub mod handler;
pub mod metrics_defs;
pub mod rate_limit;

#[cfg(test)]
mod testutils;

use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::admin_service::AdminService;
use shared::http::{full_body, run_http_service};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use timeline::allow_list::AllowList;
use timeline::cache::{CacheStore, MemoryStore, NoopStore};
use timeline::github::GithubClient;
use timeline::source::{ApiSource, select_source};

use crate::config::Config;
use crate::errors::TimelineApiError;
use crate::guard::{OriginPolicy, RequestGuard};
use crate::handler::{Defaults, TimelineHandler};
use crate::rate_limit::RateLimiter;

pub async fn run(config: Config) -> Result<(), TimelineApiError> {
    let handler = build_handler(&config);
    tracing::info!(
        path = %config.timeline_path,
        repositories = config.repositories.len(),
        environment = ?config.environment,
        "timeline api configured"
    );

    let timeline_service = TimelineService {
        handler: Arc::new(handler),
    };
    let admin_service = AdminService::<_, TimelineApiError>::new(|| true);

    let timeline_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        timeline_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );
    tokio::try_join!(timeline_task, admin_task)?;
    Ok(())
}

/// Wires the source, cache and guard described by `config`.
pub fn build_handler(config: &Config) -> TimelineHandler {
    let fetcher = Arc::new(GithubClient::new(&config.github));
    let api = ApiSource::new(fetcher, Duration::from_secs(config.github.timeout_secs));
    let source = select_source(config.database.as_ref(), api);
    tracing::info!(source = source.name(), "selected timeline source");

    let cache: Arc<dyn CacheStore> = if config.cache.enabled {
        Arc::new(MemoryStore::new(config.cache.max_entries))
    } else {
        Arc::new(NoopStore)
    };

    let guard = RequestGuard::new(
        config.environment,
        OriginPolicy::new(&config.allowed_origins),
        Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        )),
        config.trusted_proxy_header.clone(),
    );

    TimelineHandler::new(
        &config.timeline_path,
        guard,
        AllowList::new(config.repositories.clone()),
        source,
        cache,
        Defaults {
            period: config.default_period,
            locale: config.default_locale.clone(),
        },
    )
}

struct TimelineService {
    handler: Arc<TimelineHandler>,
}

impl Service<Request<Incoming>> for TimelineService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = TimelineApiError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let handler = self.handler.clone();
        // Only the head is needed; the body of a GET is ignored.
        let (parts, _body) = req.into_parts();
        let request = Request::from_parts(parts, ());

        Box::pin(async move {
            let response = handler.handle(request).await;
            Ok(response.map(|body| full_body(body)))
        })
    }
}
