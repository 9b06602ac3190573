//! Prometheus metrics for the Ariadne services
//!
//! All names carry the `ariadne_` prefix. Only the `metrics` facade is used
//! here; the gateway decides whether an exporter is installed, so every
//! helper is a cheap no-op without one.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

pub const METRICS_PREFIX: &str = "ariadne";

/// Request and inference latency buckets, in seconds
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Remote text-embedding latency buckets, in seconds
pub const EMBEDDING_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.0, 2.0, 5.0, 10.0, 30.0];

/// Full metric name for a suffix
pub fn metric_name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

enum Kind {
    Counter,
    Histogram,
    Gauge,
}

const DESCRIPTIONS: &[(&str, Kind, Unit, &str)] = &[
    ("requests_total", Kind::Counter, Unit::Count, "HTTP requests by route and status"),
    ("request_duration_seconds", Kind::Histogram, Unit::Seconds, "HTTP request latency"),
    ("inference_total", Kind::Counter, Unit::Count, "Masked GNN inference runs by outcome"),
    ("inference_duration_seconds", Kind::Histogram, Unit::Seconds, "Sampling plus forward pass latency"),
    ("subgraph_nodes", Kind::Histogram, Unit::Count, "Nodes in the sampled neighbourhood fed to the model"),
    ("recommendations_total", Kind::Counter, Unit::Count, "Feeds ranked, cold or personalized"),
    ("recommendation_duration_seconds", Kind::Histogram, Unit::Seconds, "Feed ranking latency"),
    ("recommendation_results_count", Kind::Gauge, Unit::Count, "Papers returned in the last feed"),
    ("embedding_requests_total", Kind::Counter, Unit::Count, "Text embedding calls by model and outcome"),
    ("embedding_duration_seconds", Kind::Histogram, Unit::Seconds, "Text embedding latency"),
    ("graph_nodes", Kind::Gauge, Unit::Count, "Nodes in the loaded citation graph"),
    ("graph_edges", Kind::Gauge, Unit::Count, "Directed citations in the loaded graph"),
    ("catalog_papers", Kind::Gauge, Unit::Count, "Papers with catalog metadata"),
];

/// Register metric descriptions with the installed recorder
pub fn register_metrics() {
    for (suffix, kind, unit, help) in DESCRIPTIONS {
        let name = metric_name(suffix);
        match kind {
            Kind::Counter => describe_counter!(name, unit.clone(), *help),
            Kind::Histogram => describe_histogram!(name, unit.clone(), *help),
            Kind::Gauge => describe_gauge!(name, unit.clone(), *help),
        }
    }

    tracing::info!(metrics = DESCRIPTIONS.len(), "Metrics registered");
}

/// Times one HTTP request
pub struct RequestMetrics {
    start: Instant,
    method: String,
    route: String,
}

impl RequestMetrics {
    pub fn start(method: &str, route: &str) -> Self {
        Self {
            start: Instant::now(),
            method: method.to_owned(),
            route: route.to_owned(),
        }
    }

    pub fn finish(self, status: u16) {
        let elapsed = self.start.elapsed().as_secs_f64();

        counter!(
            metric_name("requests_total"),
            "method" => self.method.clone(),
            "route" => self.route.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            metric_name("request_duration_seconds"),
            "method" => self.method,
            "route" => self.route
        )
        .record(elapsed);
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}

/// One masked inference run; failed runs only bump the counter
pub fn record_inference(duration_secs: f64, subgraph_nodes: usize, success: bool) {
    counter!(metric_name("inference_total"), "outcome" => outcome(success)).increment(1);

    if success {
        histogram!(metric_name("inference_duration_seconds")).record(duration_secs);
        histogram!(metric_name("subgraph_nodes")).record(subgraph_nodes as f64);
    }
}

/// One feed ranking; an empty history counts as a cold feed
pub fn record_recommendation(duration_secs: f64, history_len: usize, result_count: usize) {
    let mode = if history_len == 0 { "cold" } else { "personalized" };

    counter!(metric_name("recommendations_total"), "mode" => mode).increment(1);
    histogram!(metric_name("recommendation_duration_seconds"), "mode" => mode).record(duration_secs);
    gauge!(metric_name("recommendation_results_count")).set(result_count as f64);
}

/// One text-embedding call
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    counter!(
        metric_name("embedding_requests_total"),
        "model" => model.to_owned(),
        "outcome" => outcome(success)
    )
    .increment(1);

    if success {
        histogram!(metric_name("embedding_duration_seconds"), "model" => model.to_owned()).record(duration_secs);
    }
}
