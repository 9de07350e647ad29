//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

use crate::websocket::dispatcher::Snapshot;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"healthy"` while the dispatcher answers, `"degraded"` otherwise.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered realtime connections.
    pub connections: usize,
    /// Groups with at least one subscriber.
    pub groups: usize,
    /// Events dropped at intake since start.
    pub dropped_events: u64,
}

/// Build a health response. `snapshot` is `None` when the dispatcher did not answer.
pub fn health_check(
    start_time: Instant,
    snapshot: Option<&Snapshot>,
    dropped_events: u64,
) -> HealthResponse {
    HealthResponse {
        status: if snapshot.is_some() { "healthy" } else { "degraded" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: snapshot.map_or(0, |s| s.connections),
        groups: snapshot.map_or(0, |s| s.groups.len()),
        dropped_events,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lebensmittel_core::GroupId;

    use super::*;

    #[test]
    fn healthy_with_snapshot() {
        let mut snapshot = Snapshot {
            connections: 3,
            ..Snapshot::default()
        };
        let _ = snapshot.groups.insert(GroupId::from("g1"), 2);
        let resp = health_check(Instant::now(), Some(&snapshot), 4);
        assert_eq!(resp.status, "healthy");
        assert_eq!(resp.connections, 3);
        assert_eq!(resp.groups, 1);
        assert_eq!(resp.dropped_events, 4);
    }

    #[test]
    fn degraded_without_dispatcher() {
        let resp = health_check(Instant::now(), None, 0);
        assert_eq!(resp.status, "degraded");
        assert_eq!(resp.connections, 0);
    }

    #[test]
    fn uptime_counts_from_start() {
        let start = Instant::now()
            .checked_sub(Duration::from_secs(60))
            .unwrap();
        assert!(health_check(start, None, 0).uptime_secs >= 59);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(health_check(Instant::now(), None, 7)).unwrap();
        assert_eq!(json["droppedEvents"], 7);
        assert!(json["uptimeSecs"].is_number());
        assert!(json.get("uptime_secs").is_none());
    }
}
