//! Timeline source backed by a `commits` table in Postgres.
//!
//! ```sql
//! CREATE TABLE commits (
//!     repo_owner   text        NOT NULL,
//!     repo_name    text        NOT NULL,
//!     committed_at timestamptz NOT NULL
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc, Weekday};
use shared::counter;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{DatabaseConfig, RepoConfig};
use crate::errors::SourceError;
use crate::metrics_defs::DATABASE_FALLBACK;
use crate::source::{ApiSource, TimelineQuery, TimelineSource, build_data};
use crate::transform::window;
use crate::types::{DailyCount, Granularity, TimelineData};

// Postgres weeks start on Monday. Shifting timestamps forward by `$2` days
// before truncating, and back afterwards, moves the week start. `$2` is
// always 0 for day and month buckets, see `bucket_shift`.
const BUCKET_QUERY: &str = "
    SELECT lower(repo_owner) AS repo_owner,
           lower(repo_name) AS repo_name,
           (date_trunc($1, (committed_at AT TIME ZONE 'UTC') + make_interval(days => $2))
               - make_interval(days => $2))::date AS bucket,
           count(*) AS commits
    FROM commits
    WHERE committed_at >= $3
      AND committed_at < $4
      AND (lower(repo_owner), lower(repo_name)) IN (
          SELECT * FROM unnest($5::text[], $6::text[])
      )
    GROUP BY 1, 2, 3
    ORDER BY 3";

#[derive(Debug, PartialEq)]
struct BucketRow {
    owner: String,
    name: String,
    bucket: NaiveDate,
    commits: i64,
}

pub struct DatabaseSource {
    pool: PgPool,
    fallback: ApiSource,
}

impl DatabaseSource {
    pub fn new(pool: PgPool, fallback: ApiSource) -> Self {
        DatabaseSource { pool, fallback }
    }

    /// Creates the pool without connecting. Only an invalid URL fails here;
    /// an unreachable server surfaces on the first query.
    pub fn connect_lazy(config: &DatabaseConfig, fallback: ApiSource) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;
        Ok(DatabaseSource::new(pool, fallback))
    }

    async fn query_series(&self, query: &TimelineQuery) -> Result<Vec<Vec<DailyCount>>, SourceError> {
        let week_start = query.locale.week_start();
        let (first, last) = window(query.range, week_start, query.end);
        let (owners, names): (Vec<String>, Vec<String>) = query
            .repos
            .iter()
            .map(|repo| repo.repo_ref().normalized())
            .unzip();

        let granularity = query.range.granularity();
        let rows = sqlx::query(BUCKET_QUERY)
            .bind(granularity.as_sql())
            .bind(bucket_shift(granularity, week_start))
            .bind(midnight(first))
            .bind(midnight(last.checked_add_days(Days::new(1)).unwrap_or(last)))
            .bind(&owners)
            .bind(&names)
            .fetch_all(&self.pool)
            .await?;

        let rows = rows
            .iter()
            .map(|row| {
                Ok(BucketRow {
                    owner: row.try_get("repo_owner")?,
                    name: row.try_get("repo_name")?,
                    bucket: row.try_get("bucket")?,
                    commits: row.try_get("commits")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(group_rows(&query.repos, rows))
    }
}

#[async_trait]
impl TimelineSource for DatabaseSource {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn get_timeline(&self, query: &TimelineQuery) -> Result<TimelineData, SourceError> {
        match self.query_series(query).await {
            Ok(series) => Ok(build_data(query, series)),
            Err(e) => {
                counter!(DATABASE_FALLBACK).increment(1);
                tracing::warn!(error = %e, "database query failed, falling back to activity API");
                self.fallback.get_timeline(query).await
            }
        }
    }
}

/// Days added before `date_trunc` so that `week_start` lands on a Monday.
/// Only weeks depend on the locale; shifting a month bucket would move
/// commits into the previous month.
fn bucket_shift(granularity: Granularity, week_start: Weekday) -> i32 {
    match granularity {
        Granularity::Week => ((7 - week_start.num_days_from_monday()) % 7) as i32,
        Granularity::Day | Granularity::Month => 0,
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// One series per entry of `repos`, in the same order. Rows for repositories
/// that were not requested are dropped.
fn group_rows(repos: &[RepoConfig], rows: Vec<BucketRow>) -> Vec<Vec<DailyCount>> {
    let mut by_repo: HashMap<(String, String), Vec<DailyCount>> = HashMap::new();
    for row in rows {
        let commits = u64::try_from(row.commits).unwrap_or(0);
        by_repo
            .entry((row.owner.to_ascii_lowercase(), row.name.to_ascii_lowercase()))
            .or_default()
            .push(DailyCount::new(row.bucket, commits));
    }

    repos
        .iter()
        .map(|repo| {
            by_repo
                .get(&repo.repo_ref().normalized())
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}
