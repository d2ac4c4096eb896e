//! Turns raw per-day commit counts into range-bucketed, labelled points.
//!
//! The window always ends at `end` and is fully covered: buckets without
//! data are present with zero commits, so every timeline of one request has
//! the same shape.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use std::collections::BTreeMap;

use crate::locale::Locale;
use crate::types::{DailyCount, Granularity, TimeRange, TimelinePoint};

pub fn transform(
    daily: &[DailyCount],
    range: TimeRange,
    locale: &Locale,
    end: NaiveDate,
) -> Vec<TimelinePoint> {
    let granularity = range.granularity();
    let week_start = locale.week_start();

    let mut sums: BTreeMap<NaiveDate, u64> = bucket_starts(range, week_start, end)
        .into_iter()
        .map(|start| (start, 0))
        .collect();

    for day in daily.iter().filter(|day| day.date <= end) {
        let bucket = bucket_start(day.date, granularity, week_start);
        if let Some(sum) = sums.get_mut(&bucket) {
            *sum += day.commits;
        }
    }

    sums.into_iter()
        .map(|(date, commits)| TimelinePoint {
            date,
            label: label(date, range, locale),
            commits,
        })
        .collect()
}

/// First and last day covered by the window of `range` ending at `end`.
pub fn window(range: TimeRange, week_start: Weekday, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = bucket_starts(range, week_start, end)
        .first()
        .copied()
        .unwrap_or(end);
    (first, end)
}

/// Start of the bucket containing `date`.
pub fn bucket_start(date: NaiveDate, granularity: Granularity, week_start: Weekday) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            let offset = (7 + date.weekday().num_days_from_monday()
                - week_start.num_days_from_monday())
                % 7;
            date.checked_sub_days(Days::new(offset.into()))
                .unwrap_or(date)
        }
        Granularity::Month => date.with_day(1).unwrap_or(date),
    }
}

fn bucket_starts(range: TimeRange, week_start: Weekday, end: NaiveDate) -> Vec<NaiveDate> {
    match range {
        TimeRange::SevenDays => trailing_days(end, 7),
        TimeRange::ThirtyDays => trailing_days(end, 30),
        TimeRange::SixMonths => {
            let last = bucket_start(end, Granularity::Week, week_start);
            let from = end.checked_sub_months(Months::new(6)).unwrap_or(end);
            let mut current = bucket_start(from, Granularity::Week, week_start);
            let mut starts = Vec::new();
            while current <= last {
                starts.push(current);
                match current.checked_add_days(Days::new(7)) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            starts
        }
        TimeRange::TwelveMonths => {
            let last = bucket_start(end, Granularity::Month, week_start);
            (0..12)
                .rev()
                .filter_map(|back| last.checked_sub_months(Months::new(back)))
                .collect()
        }
    }
}

fn trailing_days(end: NaiveDate, count: u64) -> Vec<NaiveDate> {
    (0..count)
        .rev()
        .filter_map(|back| end.checked_sub_days(Days::new(back)))
        .collect()
}

fn label(date: NaiveDate, range: TimeRange, locale: &Locale) -> String {
    let pattern = match range {
        TimeRange::SevenDays => "%a %-d",
        TimeRange::ThirtyDays | TimeRange::SixMonths => "%b %-d",
        TimeRange::TwelveMonths => "%b %Y",
    };
    locale.format(date, pattern)
}
