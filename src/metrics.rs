//! Optional Prometheus metrics export, built from [`crate::gateway::Gateway::status`].

use crate::gateway::RouteStatus;

#[cfg(feature = "metrics")]
use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry};

/// Registers and updates gauges describing route/endpoint health.
///
/// Constructing this is optional: a [`crate::gateway::Gateway`] works
/// without it, and nothing in the request path depends on metrics being
/// enabled.
#[cfg(feature = "metrics")]
pub struct GatewayMetrics {
    healthy: IntGaugeVec,
    consecutive_failures: IntGaugeVec,
    last_latency_ms: GaugeVec,
}

#[cfg(feature = "metrics")]
impl GatewayMetrics {
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let healthy = IntGaugeVec::new(
            Opts::new("gateway_endpoint_healthy", "1 if the endpoint is healthy, else 0"),
            &["route", "endpoint"],
        )?;
        let consecutive_failures = IntGaugeVec::new(
            Opts::new(
                "gateway_endpoint_consecutive_failures",
                "consecutive non-success outcomes for the endpoint",
            ),
            &["route", "endpoint"],
        )?;
        let last_latency_ms = GaugeVec::new(
            Opts::new("gateway_endpoint_last_latency_ms", "latency of the last successful forward"),
            &["route", "endpoint"],
        )?;

        registry.register(Box::new(healthy.clone()))?;
        registry.register(Box::new(consecutive_failures.clone()))?;
        registry.register(Box::new(last_latency_ms.clone()))?;

        Ok(Self {
            healthy,
            consecutive_failures,
            last_latency_ms,
        })
    }

    /// Overwrite all gauges from a fresh status snapshot.
    pub fn update(&self, routes: &[RouteStatus]) {
        for route in routes {
            for endpoint in &route.endpoints {
                let labels: &[&str] = &[&route.id, &endpoint.id];
                self.healthy
                    .with_label_values(labels)
                    .set(endpoint.healthy as i64);
                self.consecutive_failures
                    .with_label_values(labels)
                    .set(endpoint.consecutive_failures as i64);
                if let Some(latency) = endpoint.last_latency_ms {
                    self.last_latency_ms.with_label_values(labels).set(latency as f64);
                }
            }
        }
    }
}

/// Aggregate counts over a status snapshot, used by the health summary and
/// available regardless of whether the `metrics` feature is enabled.
pub fn healthy_count(routes: &[RouteStatus]) -> usize {
    routes
        .iter()
        .flat_map(|r| &r.endpoints)
        .filter(|e| e.healthy)
        .count()
}

/// Total endpoint count across all routes.
pub fn endpoint_count(routes: &[RouteStatus]) -> usize {
    routes.iter().map(|r| r.endpoints.len()).sum()
}
