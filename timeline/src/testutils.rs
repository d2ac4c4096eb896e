use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::UpstreamError;
use crate::github::ActivityFetcher;
use crate::types::{DailyCount, RepoRef};

enum Canned {
    Daily(Vec<DailyCount>),
    Fail(u16),
    Hang,
}

/// In-memory activity fetcher for tests. Repositories without canned data
/// answer with a 404.
#[derive(Default)]
pub struct FakeFetcher {
    canned: HashMap<(String, String), Canned>,
    delays: HashMap<(String, String), Duration>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_daily(mut self, owner: &str, name: &str, daily: Vec<DailyCount>) -> Self {
        self.canned
            .insert(RepoRef::new(owner, name).normalized(), Canned::Daily(daily));
        self
    }

    pub fn with_failure(mut self, owner: &str, name: &str, status: u16) -> Self {
        self.canned
            .insert(RepoRef::new(owner, name).normalized(), Canned::Fail(status));
        self
    }

    /// The fetch for this repository never completes.
    pub fn with_hang(mut self, owner: &str, name: &str) -> Self {
        self.canned
            .insert(RepoRef::new(owner, name).normalized(), Canned::Hang);
        self
    }

    pub fn with_delay(mut self, owner: &str, name: &str, delay: Duration) -> Self {
        self.delays
            .insert(RepoRef::new(owner, name).normalized(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityFetcher for FakeFetcher {
    async fn fetch_daily(&self, repo: &RepoRef) -> Result<Vec<DailyCount>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = repo.normalized();

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        let repo_id = format!("{}/{}", repo.owner, repo.name);
        match self.canned.get(&key) {
            Some(Canned::Daily(daily)) => Ok(daily.clone()),
            Some(Canned::Fail(status)) => Err(UpstreamError::Status {
                repo: repo_id,
                status: *status,
            }),
            Some(Canned::Hang) => std::future::pending().await,
            None => Err(UpstreamError::Status {
                repo: repo_id,
                status: 404,
            }),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One count per day for `days` consecutive days starting at `from`.
pub fn daily_run(from: NaiveDate, days: u64, commits: u64) -> Vec<DailyCount> {
    (0..days)
        .map(|i| DailyCount::new(from + chrono::Days::new(i), commits))
        .collect()
}
