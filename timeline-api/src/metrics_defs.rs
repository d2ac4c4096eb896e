use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, cache.",
};

pub const RATE_LIMITED: MetricDef = MetricDef {
    name: "request.rate_limited",
    metric_type: MetricType::Counter,
    description: "Requests rejected by the per-client rate limit",
};

pub const ORIGIN_REJECTED: MetricDef = MetricDef {
    name: "request.origin_rejected",
    metric_type: MetricType::Counter,
    description: "Requests rejected because of their Origin or Referer",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUEST_DURATION, RATE_LIMITED, ORIGIN_REJECTED];
