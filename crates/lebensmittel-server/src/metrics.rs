//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Lifetime of closed WebSocket connections (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Events accepted into the dispatcher intake (counter).
pub const REALTIME_EVENTS_EMITTED_TOTAL: &str = "realtime_events_emitted_total";
/// Events dropped at submission because the intake was full or closed (counter).
pub const REALTIME_EVENTS_DROPPED_TOTAL: &str = "realtime_events_dropped_total";
/// Per-recipient writes that failed or timed out (counter).
pub const REALTIME_DELIVERIES_FAILED_TOTAL: &str = "realtime_deliveries_failed_total";
/// HTTP requests served (counter, labels: method, status).
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
