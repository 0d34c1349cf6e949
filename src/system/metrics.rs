//! Metrics collection for viewbind
//!
//! Every storage call is counted and timed per operation. The registry is
//! private to the crate so embedding applications can scrape it separately
//! (the emulator serves it on `/metrics`).

use crate::core::error::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Global metrics registry
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Request metrics for calls against the storage boundary
pub struct Metrics {
    /// Requests issued, by operation
    pub requests: IntCounterVec,
    /// Requests that returned an error, by operation
    pub request_errors: IntCounterVec,
    /// Request latency in seconds, by operation
    pub request_duration: HistogramVec,
    /// Node and edge writes sent, by instance kind
    pub instances_written: IntCounterVec,
}

impl Metrics {
    /// Create and register the metric families
    fn new(registry: &Registry) -> Result<Self> {
        let requests = IntCounterVec::new(
            Opts::new("viewbind_requests_total", "Requests sent to the storage backend"),
            &["operation"],
        )?;
        let request_errors = IntCounterVec::new(
            Opts::new(
                "viewbind_request_errors_total",
                "Requests that failed at the storage backend",
            ),
            &["operation"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "viewbind_request_duration_seconds",
                "Storage backend request latency",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["operation"],
        )?;
        let instances_written = IntCounterVec::new(
            Opts::new("viewbind_instances_written_total", "Node and edge writes sent"),
            &["kind"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_errors.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(instances_written.clone()))?;

        Ok(Self {
            requests,
            request_errors,
            request_duration,
            instances_written,
        })
    }

    /// Get the global metrics instance, or `None` if registration failed
    pub fn global() -> Option<&'static Metrics> {
        static INSTANCE: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new(&REGISTRY) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                tracing::warn!(error = %e, "metrics registration failed, metrics disabled");
                None
            }
        });
        INSTANCE.as_ref()
    }

    /// Record the outcome of one request
    pub fn observe(&self, operation: &str, elapsed: Duration, ok: bool) {
        self.requests.with_label_values(&[operation]).inc();
        self.request_duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
        if !ok {
            self.request_errors.with_label_values(&[operation]).inc();
        }
    }

    /// Record node and edge writes
    pub fn record_writes(&self, nodes: usize, edges: usize) {
        self.instances_written
            .with_label_values(&["node"])
            .inc_by(nodes as u64);
        self.instances_written
            .with_label_values(&["edge"])
            .inc_by(edges as u64);
    }
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> Result<String> {
    // Touch the families so they show up before the first request.
    let _ = Metrics::global();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_shows_up_in_text() {
        let metrics = Metrics::global().unwrap();
        metrics.observe("test_op", Duration::from_millis(3), false);
        metrics.record_writes(2, 1);

        let text = gather().unwrap();
        assert!(text.contains("viewbind_requests_total{operation=\"test_op\"}"));
        assert!(text.contains("viewbind_request_errors_total{operation=\"test_op\"}"));
        assert!(text.contains("viewbind_instances_written_total{kind=\"edge\"}"));
    }
}
