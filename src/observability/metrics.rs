//! Metrics collection.
//!
//! # Metrics
//! - `cluster_balancer_host_connections{host}`: tracked connections per host (gauge)
//! - `cluster_balancer_quarantined_total{host}`: hosts put into quarantine
//! - `cluster_balancer_refresh_total{outcome}`: topology refreshes (ok, failed, skipped)
//! - `cluster_balancer_connect_attempts_total{outcome}`: physical connects (ok, failed, rejected)
//! - `cluster_balancer_preemptions_total`: connections dropped for a better-placed host
//! - `cluster_balancer_single_host_fallbacks_total`: requests served without balancing
//!
//! Without an installed recorder every helper is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub fn record_host_connections(host: &str, count: u64) {
    gauge!("cluster_balancer_host_connections", "host" => host.to_string()).set(count as f64);
}

pub fn record_quarantined(host: &str) {
    counter!("cluster_balancer_quarantined_total", "host" => host.to_string()).increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    counter!("cluster_balancer_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_connect_attempt(outcome: &'static str) {
    counter!("cluster_balancer_connect_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_preemption() {
    counter!("cluster_balancer_preemptions_total").increment(1);
}

pub fn record_single_host_fallback() {
    counter!("cluster_balancer_single_host_fallbacks_total").increment(1);
}

/// Installs a global Prometheus recorder and returns its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
