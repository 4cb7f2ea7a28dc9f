//! Alert events raised on endpoint health transitions.

use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

/// Emitted once per contiguous Healthy -> Unhealthy interval for an endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct AlertEvent {
    pub endpoint_id: String,
    pub url: String,
    pub route_id: Option<String>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub timestamp: u64,
}

impl AlertEvent {
    pub fn new(
        endpoint_id: impl Into<String>,
        url: impl Into<String>,
        route_id: Option<String>,
        consecutive_failures: u32,
        last_error: Option<String>,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            endpoint_id: endpoint_id.into(),
            url: url.into(),
            route_id,
            consecutive_failures,
            last_error,
            timestamp,
        }
    }
}

/// A sink notified on endpoint health transitions.
///
/// Dispatch is fire-and-forget: the request path constructs the event and
/// hands it off without waiting for the sink to run.
pub type AlertSink = Arc<dyn Fn(AlertEvent) + Send + Sync>;

/// Hand an alert event off to `sink` on a detached task. Panics inside the
/// sink are caught and logged; they never reach the caller.
pub fn dispatch(sink: &AlertSink, event: AlertEvent) {
    let sink = Arc::clone(sink);
    warn!(
        endpoint = %event.endpoint_id,
        url = %event.url,
        consecutive_failures = event.consecutive_failures,
        "endpoint marked unhealthy, dispatching alert"
    );
    tokio::spawn(async move {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| sink(event)));
        if result.is_err() {
            error!("alert sink panicked");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn dispatch_invokes_sink_without_blocking_caller() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let sink: AlertSink = Arc::new(move |_event| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let event = AlertEvent::new("endpoint-0", "https://rpc.example.com", None, 3, None);
        dispatch(&sink, event);

        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_survives_panicking_sink() {
        let sink: AlertSink = Arc::new(|_event| panic!("boom"));
        let event = AlertEvent::new("endpoint-0", "https://rpc.example.com", None, 3, None);
        dispatch(&sink, event);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
