use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::RepoConfig;

/// Selectable time ranges of the timeline endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "12m")]
    TwelveMonths,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::SevenDays,
        TimeRange::ThirtyDays,
        TimeRange::SixMonths,
        TimeRange::TwelveMonths,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
            TimeRange::SixMonths => "6m",
            TimeRange::TwelveMonths => "12m",
        }
    }

    pub const fn granularity(&self) -> Granularity {
        match self {
            TimeRange::SevenDays | TimeRange::ThirtyDays => Granularity::Day,
            TimeRange::SixMonths => Granularity::Week,
            TimeRange::TwelveMonths => Granularity::Month,
        }
    }

    /// How long a computed timeline for this range may be served from cache.
    pub const fn cache_ttl(&self) -> Duration {
        match self {
            TimeRange::SevenDays => Duration::from_secs(300),
            TimeRange::ThirtyDays => Duration::from_secs(900),
            TimeRange::SixMonths => Duration::from_secs(3600),
            TimeRange::TwelveMonths => Duration::from_secs(7200),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown time range: {0}")]
pub struct UnknownTimeRange(pub String);

impl FromStr for TimeRange {
    type Err = UnknownTimeRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| UnknownTimeRange(s.to_string()))
    }
}

/// Aggregation unit used when bucketing daily counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Field name understood by postgres `date_trunc`.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

/// Repository reference as supplied by clients.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        RepoRef {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Case-normalized `(owner, name)` used for allow-list comparison.
    pub fn normalized(&self) -> (String, String) {
        (self.owner.to_ascii_lowercase(), self.name.to_ascii_lowercase())
    }
}

/// Raw commit count of one day, as reported by an upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub commits: u64,
}

impl DailyCount {
    pub fn new(date: NaiveDate, commits: u64) -> Self {
        DailyCount { date, commits }
    }
}

impl From<&TimelinePoint> for DailyCount {
    fn from(point: &TimelinePoint) -> Self {
        DailyCount::new(point.date, point.commits)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub label: String,
    pub commits: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoTimeline {
    pub repo_name: String,
    pub repo_display_name: String,
    pub color: String,
    pub data: Vec<TimelinePoint>,
    pub total_commits: u64,
}

impl RepoTimeline {
    pub fn new(repo: &RepoConfig, data: Vec<TimelinePoint>) -> Self {
        let total_commits = data.iter().map(|point| point.commits).sum();
        RepoTimeline {
            repo_name: repo.key(),
            repo_display_name: repo.display_name().to_string(),
            color: repo.color.clone(),
            data,
            total_commits,
        }
    }
}

/// One date bucket of the combined timeline.
///
/// Serialized as a flat object: `{"date": .., "label": .., "<repo key>": n, ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiRepoTimelinePoint {
    pub date: NaiveDate,
    pub label: String,
    #[serde(flatten)]
    pub commits: BTreeMap<String, u64>,
}

impl MultiRepoTimelinePoint {
    pub fn new(date: NaiveDate, label: String) -> Self {
        MultiRepoTimelinePoint {
            date,
            label,
            commits: BTreeMap::new(),
        }
    }
}

/// Per-repository timelines together with their merged view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineData {
    pub timelines: Vec<RepoTimeline>,
    pub combined_timeline: Vec<MultiRepoTimelinePoint>,
}
