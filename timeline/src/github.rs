//! Client for the GitHub commit activity statistics endpoint.
//!
//! `GET /repos/{owner}/{repo}/stats/commit_activity` returns the last 52 weeks
//! of activity, one row per week starting on Sunday, with seven daily counts.
//! GitHub answers `202 Accepted` while the statistics are being computed.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use url::Url;

use crate::config::GithubConfig;
use crate::errors::UpstreamError;
use crate::types::{DailyCount, RepoRef};

/// Source of raw per-day commit counts for one repository.
#[async_trait]
pub trait ActivityFetcher: Send + Sync {
    async fn fetch_daily(&self, repo: &RepoRef) -> Result<Vec<DailyCount>, UpstreamError>;
}

#[derive(Deserialize, Debug)]
struct WeeklyActivity {
    /// Unix timestamp of the first day (Sunday) of the week.
    week: i64,
    days: Vec<u64>,
}

pub struct GithubClient {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
    user_agent: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Self {
        GithubClient {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            token: config
                .token
                .clone()
                .or_else(|| std::env::var("GITHUB_TOKEN").ok())
                .filter(|token| !token.is_empty()),
            user_agent: config.user_agent.clone(),
        }
    }

    fn activity_url(&self, repo: &RepoRef) -> Result<Url, UpstreamError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend([
                "repos",
                repo.owner.as_str(),
                repo.name.as_str(),
                "stats",
                "commit_activity",
            ]);
        Ok(url)
    }
}

#[async_trait]
impl ActivityFetcher for GithubClient {
    async fn fetch_daily(&self, repo: &RepoRef) -> Result<Vec<DailyCount>, UpstreamError> {
        let repo_id = format!("{}/{}", repo.owner, repo.name);
        let mut request = self
            .client
            .get(self.activity_url(repo)?)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, &self.user_agent);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::ACCEPTED => return Err(UpstreamError::Pending(repo_id)),
            status => {
                return Err(UpstreamError::Status {
                    repo: repo_id,
                    status: status.as_u16(),
                });
            }
        }

        let weeks = response.json::<Vec<WeeklyActivity>>().await?;
        Ok(flatten_weeks(&weeks))
    }
}

fn flatten_weeks(weeks: &[WeeklyActivity]) -> Vec<DailyCount> {
    let mut daily: Vec<DailyCount> = weeks
        .iter()
        .filter_map(|week| {
            let start: NaiveDate = DateTime::from_timestamp(week.week, 0)?.date_naive();
            Some((start, week))
        })
        .flat_map(|(start, week)| {
            week.days.iter().enumerate().filter_map(move |(offset, commits)| {
                let date = start.checked_add_days(Days::new(offset as u64))?;
                Some(DailyCount::new(date, *commits))
            })
        })
        .collect();
    daily.sort_by_key(|day| day.date);
    daily
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    // 2024-01-07 and 2024-01-14, both Sundays
    const ACTIVITY: &str = r#"[
        {"week": 1704585600, "total": 3, "days": [0, 1, 2, 0, 0, 0, 0]},
        {"week": 1705190400, "total": 4, "days": [4, 0, 0, 0, 0, 0, 0]}
    ]"#;

    async fn fake_github(req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = req.uri().path().to_string();
        let authorized = req.headers().get("authorization").is_some();
        let has_agent = req.headers().get("user-agent").is_some();

        let (status, body) = match path.as_str() {
            _ if !has_agent => (403, ""),
            "/repos/octo/site/stats/commit_activity" if authorized => (200, ACTIVITY),
            "/repos/octo/site/stats/commit_activity" => (401, ""),
            "/repos/octo/fresh/stats/commit_activity" => (202, "{}"),
            _ => (404, r#"{"message": "Not Found"}"#),
        };

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = hyper::StatusCode::from_u16(status).unwrap();
        Ok(response)
    }

    async fn start_fake_github() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service_fn(fake_github))
                        .await;
                });
            }
        });

        Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap()
    }

    fn client(api_url: Url, token: Option<&str>) -> GithubClient {
        GithubClient {
            client: reqwest::Client::new(),
            api_url,
            token: token.map(String::from),
            user_agent: "commit-pulse-tests".into(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_flatten_weeks() {
        let weeks: Vec<WeeklyActivity> = serde_json::from_str(ACTIVITY).unwrap();
        let daily = flatten_weeks(&weeks);
        assert_eq!(daily.len(), 14);
        assert_eq!(daily[0], DailyCount::new(date(2024, 1, 7), 0));
        assert_eq!(daily[1], DailyCount::new(date(2024, 1, 8), 1));
        assert_eq!(daily[2], DailyCount::new(date(2024, 1, 9), 2));
        assert_eq!(daily[7], DailyCount::new(date(2024, 1, 14), 4));
    }

    #[test]
    fn test_activity_url() {
        let github = client(Url::parse("https://api.example.com/v3").unwrap(), None);
        let url = github.activity_url(&RepoRef::new("octo", "site")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v3/repos/octo/site/stats/commit_activity"
        );
    }

    #[tokio::test]
    async fn test_fetch_daily() {
        let api_url = start_fake_github().await;

        let github = client(api_url.clone(), Some("secret"));
        let daily = github.fetch_daily(&RepoRef::new("octo", "site")).await.unwrap();
        assert_eq!(daily.iter().map(|d| d.commits).sum::<u64>(), 7);

        let pending = github.fetch_daily(&RepoRef::new("octo", "fresh")).await;
        assert!(matches!(pending, Err(UpstreamError::Pending(_))));

        let missing = github.fetch_daily(&RepoRef::new("octo", "gone")).await;
        assert!(matches!(
            missing,
            Err(UpstreamError::Status { status: 404, .. })
        ));

        let anonymous = client(api_url, None);
        let unauthorized = anonymous.fetch_daily(&RepoRef::new("octo", "site")).await;
        assert!(matches!(
            unauthorized,
            Err(UpstreamError::Status { status: 401, .. })
        ));
    }
}
