//! Metrics definitions for the leaderboard service.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

macro_rules! counter {
    ($def:expr) => {
        ::metrics::counter!($def.name)
    };
    ($def:expr, $($labels:tt)+) => {
        ::metrics::counter!($def.name, $($labels)+)
    };
}

macro_rules! histogram {
    ($def:expr) => {
        ::metrics::histogram!($def.name)
    };
    ($def:expr, $($labels:tt)+) => {
        ::metrics::histogram!($def.name, $($labels)+)
    };
}

pub(crate) use counter;
pub(crate) use histogram;

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "cache.hit",
    metric_type: MetricType::Counter,
    description: "Cache lookups served from memory, tagged by purpose",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "cache.miss",
    metric_type: MetricType::Counter,
    description: "Cache lookups that had to go to a backend, tagged by purpose",
};

pub const BACKEND_REQUEST_DURATION: MetricDef = MetricDef {
    name: "backend.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete one XML-RPC request in seconds",
};

pub const BACKEND_REQUEST_ERROR: MetricDef = MetricDef {
    name: "backend.request.error",
    metric_type: MetricType::Counter,
    description: "XML-RPC requests that failed, tagged by source and error kind",
};

pub const DISCOVERY_SUCCESS: MetricDef = MetricDef {
    name: "discovery.success",
    metric_type: MetricType::Counter,
    description: "Relay endpoints discovered",
};

pub const DISCOVERY_FAILURE: MetricDef = MetricDef {
    name: "discovery.failure",
    metric_type: MetricType::Counter,
    description: "Discovery handshakes that did not yield a relay endpoint",
};

pub const RECORDS_QUERY_DURATION: MetricDef = MetricDef {
    name: "records.query.duration",
    metric_type: MetricType::Histogram,
    description: "Time to answer an aggregated records query in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    BACKEND_REQUEST_DURATION,
    BACKEND_REQUEST_ERROR,
    DISCOVERY_SUCCESS,
    DISCOVERY_FAILURE,
    RECORDS_QUERY_DURATION,
];
