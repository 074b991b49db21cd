use shared::metrics_defs::{MetricDef, MetricType};

pub const RELAY_REQUESTS: MetricDef = MetricDef {
    name: "relay.requests",
    metric_type: MetricType::Counter,
    description: "Chat requests forwarded upstream. Tagged with mode.",
};

pub const RELAY_UPSTREAM_ERRORS: MetricDef = MetricDef {
    name: "relay.upstream.errors",
    metric_type: MetricType::Counter,
    description: "Failed upstream chat requests. Tagged with mode, kind.",
};

pub const RELAY_UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "relay.upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Time until the upstream answered with headers, in seconds. Tagged with mode.",
};

pub const ALL_METRICS: &[MetricDef] = &[RELAY_REQUESTS, RELAY_UPSTREAM_ERRORS, RELAY_UPSTREAM_DURATION];
