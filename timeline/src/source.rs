//! Where timelines come from.
//!
//! [`ApiSource`] fetches every requested repository from the activity API in
//! parallel. [`crate::database::DatabaseSource`] reads pre-aggregated counts
//! from Postgres and falls back to the API when the query fails.

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::config::{DatabaseConfig, RepoConfig};
use crate::database::DatabaseSource;
use crate::errors::{SourceError, UpstreamError};
use crate::github::ActivityFetcher;
use crate::locale::Locale;
use crate::merge::merge;
use crate::metrics_defs::{UPSTREAM_DURATION, UPSTREAM_FAILURE};
use crate::transform::transform;
use crate::types::{DailyCount, RepoTimeline, TimeRange, TimelineData};

/// A resolved timeline request. `repos` are allow-listed and deduplicated.
#[derive(Clone, Debug)]
pub struct TimelineQuery {
    pub repos: Vec<RepoConfig>,
    pub range: TimeRange,
    pub locale: Locale,
    /// Last day of the window, normally today in UTC.
    pub end: NaiveDate,
}

#[async_trait]
pub trait TimelineSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds one timeline per requested repository, in request order, plus
    /// the combined view.
    async fn get_timeline(&self, query: &TimelineQuery) -> Result<TimelineData, SourceError>;
}

/// Transforms one raw series per repository of `query` and merges them.
///
/// `series` is matched to `query.repos` by position.
pub fn build_data(query: &TimelineQuery, series: Vec<Vec<DailyCount>>) -> TimelineData {
    let timelines: Vec<RepoTimeline> = query
        .repos
        .iter()
        .zip(series)
        .map(|(repo, daily)| {
            RepoTimeline::new(
                repo,
                transform(&daily, query.range, &query.locale, query.end),
            )
        })
        .collect();
    let combined_timeline = merge(&timelines);

    TimelineData {
        timelines,
        combined_timeline,
    }
}

#[derive(Clone)]
pub struct ApiSource {
    fetcher: Arc<dyn ActivityFetcher>,
    timeout: Duration,
}

impl ApiSource {
    pub fn new(fetcher: Arc<dyn ActivityFetcher>, timeout: Duration) -> Self {
        ApiSource { fetcher, timeout }
    }

    /// Fetches all repositories concurrently. A repository whose fetch fails
    /// or times out contributes an empty series.
    pub async fn fetch_all(&self, repos: &[RepoConfig]) -> Vec<Vec<DailyCount>> {
        let mut join_set = JoinSet::new();

        for (index, repo) in repos.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let repo = repo.repo_ref();
            let limit = self.timeout;

            join_set.spawn(async move {
                let started = Instant::now();
                let result = match tokio::time::timeout(limit, fetcher.fetch_daily(&repo)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(UpstreamError::Timeout(format!(
                        "{}/{}",
                        repo.owner, repo.name
                    ))),
                };
                histogram!(UPSTREAM_DURATION).record(started.elapsed().as_secs_f64());
                (index, repo, result)
            });
        }

        let mut series = vec![Vec::new(); repos.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, _, Ok(daily))) => series[index] = daily,
                Ok((_, repo, Err(e))) => {
                    counter!(UPSTREAM_FAILURE).increment(1);
                    tracing::warn!(
                        owner = %repo.owner,
                        name = %repo.name,
                        error = %e,
                        "repository fetch failed, using empty series"
                    );
                }
                Err(e) => {
                    counter!(UPSTREAM_FAILURE).increment(1);
                    tracing::error!(error = %e, "repository fetch task failed");
                }
            }
        }

        series
    }
}

#[async_trait]
impl TimelineSource for ApiSource {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn get_timeline(&self, query: &TimelineQuery) -> Result<TimelineData, SourceError> {
        let series = self.fetch_all(&query.repos).await;
        Ok(build_data(query, series))
    }
}

/// Picks the database source when one is configured and its pool can be
/// created, and the API source otherwise.
pub fn select_source(database: Option<&DatabaseConfig>, api: ApiSource) -> Arc<dyn TimelineSource> {
    let Some(config) = database else {
        return Arc::new(api);
    };

    match DatabaseSource::connect_lazy(config, api.clone()) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::warn!(error = %e, "invalid database configuration, using activity API");
            Arc::new(api)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{FakeFetcher, date, daily_run};

    fn query(repos: Vec<RepoConfig>) -> TimelineQuery {
        TimelineQuery {
            repos,
            range: TimeRange::SevenDays,
            locale: Locale::parse("en"),
            end: date(2024, 1, 7),
        }
    }

    fn repo(owner: &str, name: &str) -> RepoConfig {
        RepoConfig::new(owner, name, "#123456")
    }

    #[tokio::test]
    async fn test_partial_failure_yields_empty_series() {
        let fetcher = FakeFetcher::new()
            .with_daily("octo", "a", daily_run(date(2024, 1, 1), 7, 2))
            .with_failure("octo", "b", 500);
        let source = ApiSource::new(Arc::new(fetcher), Duration::from_secs(5));

        let data = source
            .get_timeline(&query(vec![repo("octo", "a"), repo("octo", "b")]))
            .await
            .unwrap();

        assert_eq!(data.timelines.len(), 2);
        assert_eq!(data.timelines[0].total_commits, 14);
        assert_eq!(data.timelines[1].repo_name, "octo/b");
        assert_eq!(data.timelines[1].total_commits, 0);
        assert_eq!(data.timelines[1].data.len(), 7);
        assert_eq!(data.combined_timeline.len(), 7);
        assert!(data.combined_timeline.iter().all(|p| p.commits["octo/b"] == 0));
    }

    #[tokio::test]
    async fn test_results_keep_request_order() {
        let fetcher = FakeFetcher::new()
            .with_daily("octo", "slow", daily_run(date(2024, 1, 1), 1, 1))
            .with_delay("octo", "slow", Duration::from_millis(100))
            .with_daily("octo", "fast", daily_run(date(2024, 1, 1), 1, 9));
        let source = ApiSource::new(Arc::new(fetcher), Duration::from_secs(5));

        let data = source
            .get_timeline(&query(vec![repo("octo", "slow"), repo("octo", "fast")]))
            .await
            .unwrap();

        let names: Vec<&str> = data.timelines.iter().map(|t| t.repo_name.as_str()).collect();
        assert_eq!(names, ["octo/slow", "octo/fast"]);
        assert_eq!(data.timelines[0].total_commits, 1);
        assert_eq!(data.timelines[1].total_commits, 9);
    }

    #[tokio::test]
    async fn test_hanging_fetch_times_out() {
        let fetcher = Arc::new(
            FakeFetcher::new()
                .with_daily("octo", "a", daily_run(date(2024, 1, 5), 3, 1))
                .with_hang("octo", "stuck"),
        );
        let source = ApiSource::new(fetcher.clone(), Duration::from_millis(50));

        let series = source
            .fetch_all(&[repo("octo", "stuck"), repo("octo", "a")])
            .await;

        assert!(series[0].is_empty());
        assert_eq!(series[1].len(), 3);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_select_source_without_database() {
        let api = ApiSource::new(Arc::new(FakeFetcher::new()), Duration::from_secs(1));
        assert_eq!(select_source(None, api.clone()).name(), "api");

        let broken = DatabaseConfig {
            url: "not a url".into(),
            max_connections: 1,
            acquire_timeout_secs: 1,
        };
        assert_eq!(select_source(Some(&broken), api).name(), "api");
    }
}
