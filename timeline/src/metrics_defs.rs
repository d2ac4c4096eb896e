//! Metrics definitions for timeline computation.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "timeline.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of timeline lookups served from the cache",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "timeline.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of timeline lookups that had to be computed",
};

pub const CACHE_ERROR: MetricDef = MetricDef {
    name: "timeline.cache.error",
    metric_type: MetricType::Counter,
    description: "Cache store reads or writes that failed. Tagged with op.",
};

pub const UPSTREAM_FAILURE: MetricDef = MetricDef {
    name: "timeline.upstream.failure",
    metric_type: MetricType::Counter,
    description: "Repository fetches replaced by an empty series",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "timeline.upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single repository fetch in seconds",
};

pub const DATABASE_FALLBACK: MetricDef = MetricDef {
    name: "timeline.database.fallback",
    metric_type: MetricType::Counter,
    description: "Database queries that failed and fell back to the activity API",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    CACHE_ERROR,
    UPSTREAM_FAILURE,
    UPSTREAM_DURATION,
    DATABASE_FALLBACK,
];
