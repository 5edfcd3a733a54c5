use crate::errors::{ServeError, ServeResult};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Per-server counters. Each server owns its own registry so that servers
/// running side by side in one test binary never share state.
pub struct ServerMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    bytes_served_total: IntCounter,
    active_connections: IntGauge,
}

impl ServerMetrics {
    pub fn new() -> ServeResult<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "repo_server_requests_total",
                "Total number of HTTP requests by method and status",
            ),
            &["method", "status"],
        )
        .map_err(metrics_error)?;
        let bytes_served_total = IntCounter::new(
            "repo_server_bytes_served_total",
            "Total number of file body bytes written to clients",
        )
        .map_err(metrics_error)?;
        let active_connections = IntGauge::new(
            "repo_server_active_connections",
            "Number of currently open client connections",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(requests_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(bytes_served_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(active_connections.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            requests_total,
            bytes_served_total,
            active_connections,
        })
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
    }

    pub fn add_bytes_served(&self, bytes: u64) {
        self.bytes_served_total.inc_by(bytes);
    }

    /// Requests answered with `status`, summed over methods.
    pub fn requests_with_status(&self, status: u16) -> u64 {
        let status = status.to_string();
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "repo_server_requests_total")
            .flat_map(|family| family.get_metric().iter())
            .filter(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|label| label.get_name() == "status" && label.get_value() == status)
            })
            .map(|metric| metric.get_counter().get_value() as u64)
            .sum()
    }

    pub fn bytes_served(&self) -> u64 {
        self.bytes_served_total.get()
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.get()
    }

    pub fn connection_guard(&self) -> ConnectionGuard<'_> {
        self.active_connections.inc();
        ConnectionGuard {
            gauge: &self.active_connections,
        }
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn gather(&self) -> ServeResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(metrics_error)
    }
}

pub struct ConnectionGuard<'a> {
    gauge: &'a IntGauge,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

fn metrics_error(err: impl std::fmt::Display) -> ServeError {
    ServeError::Metrics(err.to_string())
}
