use shared::metrics_defs::{MetricDef, MetricType};

pub const GATEWAY_REQUESTS: MetricDef = MetricDef {
    name: "gateway.requests",
    metric_type: MetricType::Counter,
    description: "Requests handled. Tagged with route, status.",
};

pub const GATEWAY_REQUEST_DURATION: MetricDef = MetricDef {
    name: "gateway.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time until the response head was ready, in seconds. Tagged with route, status.",
};

pub const GATEWAY_AUTH_REJECTED: MetricDef = MetricDef {
    name: "gateway.auth.rejected",
    metric_type: MetricType::Counter,
    description: "Requests rejected for a missing or invalid access key",
};

pub const ALL_METRICS: &[MetricDef] = &[
    GATEWAY_REQUESTS,
    GATEWAY_REQUEST_DURATION,
    GATEWAY_AUTH_REJECTED,
];
