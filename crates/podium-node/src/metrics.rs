use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// HTTP-layer metrics; the certification core registers its own in the default registry
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    pub api_requests: IntCounterVec,
    pub api_errors: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let api_requests = IntCounterVec::new(
            Opts::new("podium_api_requests_total", "Total API requests"),
            &["route"],
        )
        .unwrap();
        let api_errors = IntCounterVec::new(
            Opts::new("podium_api_errors_total", "Total API error responses"),
            &["status"],
        )
        .unwrap();

        registry.register(Box::new(api_requests.clone())).unwrap();
        registry.register(Box::new(api_errors.clone())).unwrap();

        Self {
            registry,
            api_requests,
            api_errors,
        }
    }

    /// Text exposition of the node registry followed by the default registry
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let mut families = self.registry.gather();
        families.extend(prometheus::gather());
        encoder.encode_to_string(&families).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
