//! Aligns per-repository timelines onto one shared sequence of date buckets.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::types::{MultiRepoTimelinePoint, RepoTimeline};

/// Merges `timelines` into a combined, date-ascending timeline.
///
/// Every returned point carries a value for every repository in `timelines`,
/// zero where that repository has no bucket for the date. The result does not
/// depend on the order of `timelines`.
pub fn merge(timelines: &[RepoTimeline]) -> Vec<MultiRepoTimelinePoint> {
    let mut ordered: Vec<&RepoTimeline> = timelines.iter().collect();
    ordered.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));

    let mut by_date: BTreeMap<NaiveDate, MultiRepoTimelinePoint> = BTreeMap::new();
    for timeline in &ordered {
        for point in &timeline.data {
            let combined = by_date
                .entry(point.date)
                .or_insert_with(|| MultiRepoTimelinePoint::new(point.date, point.label.clone()));
            *combined
                .commits
                .entry(timeline.repo_name.clone())
                .or_insert(0) += point.commits;
        }
    }

    for combined in by_date.values_mut() {
        for timeline in &ordered {
            combined
                .commits
                .entry(timeline.repo_name.clone())
                .or_insert(0);
        }
    }

    by_date.into_values().collect()
}
