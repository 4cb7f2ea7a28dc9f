//! Upstream endpoint definitions and health state tracking.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Configuration for a single upstream endpoint, as supplied by a [`crate::route::RouteConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// HTTP/HTTPS URL this endpoint forwards to.
    pub url: String,

    /// Weight for future weighted selection policies. Not consulted by the
    /// current round-robin selector; retained for config compatibility.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Priority for future priority-aware selection policies. Not consulted
    /// by the current round-robin selector; retained for config compatibility.
    #[serde(default)]
    pub priority: u32,

    /// Headers merged into every outbound request to this endpoint. These
    /// win over caller-supplied headers of the same name.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout. `None` means no endpoint-specific timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Method whitelist. `None` means all methods are supported.
    #[serde(default)]
    pub methods: Option<HashSet<String>>,

    /// Method blocklist. Always wins over the whitelist on conflict.
    #[serde(default)]
    pub blocked_methods: HashSet<String>,
}

fn default_weight() -> u32 {
    1
}

impl EndpointConfig {
    /// Create a config pointing at `url` with otherwise default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            weight: default_weight(),
            priority: 0,
            headers: HashMap::new(),
            timeout_ms: None,
            methods: None,
            blocked_methods: HashSet::new(),
        }
    }
}

/// Point-in-time snapshot of an endpoint's health, safe to clone and hand
/// out to callers without holding the endpoint's lock.
#[derive(Clone, Debug, Serialize)]
pub struct EndpointStatus {
    pub id: String,
    pub url: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_latency_ms: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct HealthState {
    healthy: bool,
    consecutive_failures: u32,
    last_latency_ms: Option<u64>,
    last_error: Option<String>,
    alert_sent: bool,
}

impl HealthState {
    fn new() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            last_latency_ms: None,
            last_error: None,
            alert_sent: false,
        }
    }
}

/// A runtime endpoint: stable identity, immutable routing config, and
/// mutable health state behind a single lock.
///
/// The lock serializes the handful of fields mutated per request; it is
/// never held across network I/O.
#[derive(Debug)]
pub struct Endpoint {
    pub id: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout_ms: Option<u64>,
    methods: Option<HashSet<String>>,
    blocked_methods: HashSet<String>,
    state: Mutex<HealthState>,
}

/// Outcome of a single forward attempt, as classified by the caller (the
/// pool) after issuing the upstream request.
pub enum ForwardOutcome {
    /// HTTP response with status in `[200, 300)`.
    Success { latency_ms: u64 },
    /// HTTP response with a non-2xx status.
    SoftFailure { latency_ms: u64, detail: String },
    /// No HTTP response at all (network error, timeout, cancellation).
    HardFailure { detail: String },
}

impl Endpoint {
    pub fn from_config(index: usize, config: &EndpointConfig) -> Self {
        Self {
            id: format!("endpoint-{index}"),
            url: config.url.clone(),
            headers: config.headers.clone(),
            timeout_ms: config.timeout_ms,
            methods: config.methods.clone(),
            blocked_methods: config.blocked_methods.clone(),
            state: Mutex::new(HealthState::new()),
        }
    }

    /// Whether this endpoint supports `method`: not blocked, and either
    /// unrestricted or explicitly whitelisted.
    pub fn supports_method(&self, method: &str) -> bool {
        if self.blocked_methods.contains(method) {
            return false;
        }
        match &self.methods {
            Some(allowed) => allowed.contains(method),
            None => true,
        }
    }

    /// Whether this endpoint supports every method in `methods`. An empty
    /// list is vacuously supported.
    pub fn supports_all(&self, methods: &[String]) -> bool {
        methods.iter().all(|m| self.supports_method(m))
    }

    pub fn is_healthy(&self) -> bool {
        self.state.lock().healthy
    }

    pub fn status(&self) -> EndpointStatus {
        let state = self.state.lock();
        EndpointStatus {
            id: self.id.clone(),
            url: self.url.clone(),
            healthy: state.healthy,
            consecutive_failures: state.consecutive_failures,
            last_latency_ms: state.last_latency_ms,
            last_error: state.last_error.clone(),
        }
    }

    /// Apply a forward outcome. Returns `Some(())` if this outcome caused a
    /// fresh Healthy -> Unhealthy transition that should raise an alert.
    pub fn record_outcome(&self, outcome: &ForwardOutcome, failure_threshold: u32) -> bool {
        let mut state = self.state.lock();
        match outcome {
            ForwardOutcome::Success { latency_ms } => {
                state.last_latency_ms = Some(*latency_ms);
                state.consecutive_failures = 0;
                state.last_error = None;
                state.healthy = true;
                state.alert_sent = false;
                false
            }
            ForwardOutcome::SoftFailure { latency_ms, detail } => {
                state.last_latency_ms = Some(*latency_ms);
                self.record_failure_locked(&mut state, detail.clone(), failure_threshold)
            }
            ForwardOutcome::HardFailure { detail } => {
                self.record_failure_locked(&mut state, detail.clone(), failure_threshold)
            }
        }
    }

    fn record_failure_locked(
        &self,
        state: &mut HealthState,
        detail: String,
        failure_threshold: u32,
    ) -> bool {
        state.consecutive_failures += 1;
        state.last_error = Some(detail);

        if state.consecutive_failures >= failure_threshold && state.healthy {
            state.healthy = false;
            if !state.alert_sent {
                state.alert_sent = true;
                return true;
            }
        }
        false
    }

    /// Manually mark healthy. Clears failure count and any pending alert gate.
    pub fn mark_healthy(&self) {
        let mut state = self.state.lock();
        state.healthy = true;
        state.consecutive_failures = 0;
        state.last_error = None;
        state.alert_sent = false;
    }

    /// Manually mark unhealthy. Returns `true` if this is a fresh transition
    /// (or the first alert for the current unhealthy interval) that should
    /// raise an alert.
    pub fn mark_unhealthy(&self, reason: Option<String>) -> bool {
        let mut state = self.state.lock();
        let was_healthy = state.healthy;
        state.healthy = false;
        if let Some(reason) = reason {
            state.last_error = Some(reason);
        }
        if (was_healthy || !state.alert_sent) && !state.alert_sent {
            state.alert_sent = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::from_config(0, &EndpointConfig::new("https://rpc.example.com"))
    }

    #[test]
    fn success_resets_failure_state() {
        let e = endpoint();
        e.record_outcome(
            &ForwardOutcome::SoftFailure {
                latency_ms: 5,
                detail: "HTTP 500".into(),
            },
            3,
        );
        e.record_outcome(&ForwardOutcome::Success { latency_ms: 10 }, 3);

        let status = e.status();
        assert!(status.healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn threshold_eviction_emits_one_alert() {
        let e = endpoint();
        let outcome = ForwardOutcome::SoftFailure {
            latency_ms: 5,
            detail: "HTTP 500".into(),
        };

        assert!(!e.record_outcome(&outcome, 3));
        assert!(e.is_healthy());
        assert!(!e.record_outcome(&outcome, 3));
        assert!(e.is_healthy());
        assert!(e.record_outcome(&outcome, 3));
        assert!(!e.is_healthy());

        // Further failures must not raise a second alert.
        assert!(!e.record_outcome(&outcome, 3));
    }

    #[test]
    fn mark_unhealthy_then_mark_healthy_round_trips() {
        let e = endpoint();
        e.mark_unhealthy(Some("manual".into()));
        assert!(!e.is_healthy());

        e.mark_healthy();
        let status = e.status();
        assert!(status.healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn repeated_mark_unhealthy_does_not_re_alert() {
        let e = endpoint();
        assert!(e.mark_unhealthy(Some("first".into())));
        assert!(!e.mark_unhealthy(Some("second".into())));
    }

    #[test]
    fn blocked_methods_win_over_whitelist() {
        let mut config = EndpointConfig::new("https://rpc.example.com");
        config.methods = Some(["getSlot".to_string()].into_iter().collect());
        config.blocked_methods = ["getSlot".to_string()].into_iter().collect();
        let e = Endpoint::from_config(0, &config);

        assert!(!e.supports_method("getSlot"));
    }

    #[test]
    fn unrestricted_endpoint_supports_any_method() {
        let e = endpoint();
        assert!(e.supports_method("anything"));
        assert!(e.supports_all(&["a".to_string(), "b".to_string()]));
    }
}
