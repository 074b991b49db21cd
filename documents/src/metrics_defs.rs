//! Metrics definitions for document resolution.

use shared::metrics_defs::{MetricDef, MetricType};

pub const DOCUMENTS_RESOLVED: MetricDef = MetricDef {
    name: "documents.resolved",
    metric_type: MetricType::Counter,
    description: "Resolved documents, tagged by document kind and the tier that answered",
};

pub const DOCUMENTS_TIER_FAILED: MetricDef = MetricDef {
    name: "documents.tier_failed",
    metric_type: MetricType::Counter,
    description: "Store or file lookups that failed and fell through to the next tier",
};

pub const ALL_METRICS: &[MetricDef] = &[DOCUMENTS_RESOLVED, DOCUMENTS_TIER_FAILED];
