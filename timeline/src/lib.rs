//! Commit activity timelines for a fixed set of repositories.
//!
//! Raw per-day counts come from a [`source::TimelineSource`], are bucketed by
//! [`transform`] according to the requested [`types::TimeRange`], and merged
//! into one combined timeline by [`merge`].

pub mod allow_list;
pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod github;
pub mod locale;
pub mod merge;
pub mod metrics_defs;
pub mod source;
pub mod transform;
pub mod types;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;
