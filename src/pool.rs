//! Health-tracked, round-robin pool of upstream endpoints.

use crate::alert::{dispatch, AlertEvent, AlertSink};
use crate::endpoint::{Endpoint, EndpointConfig, EndpointStatus, ForwardOutcome};
use crate::error::PoolError;
use crate::headers::{merge_outbound, strip_hop_by_hop};

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Tunables for a [`Pool`].
#[derive(Clone, Debug)]
pub struct PoolOptions {
    /// Consecutive failures before an endpoint is evicted from the healthy set.
    pub failure_threshold: u32,
    /// Minimum number of healthy endpoints required before the fallback
    /// (serving from the full candidate set) kicks in.
    pub min_healthy: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            min_healthy: 1,
        }
    }
}

/// The result of forwarding a request through the pool.
pub enum ForwardResult {
    /// An HTTP response was received from the upstream (any status code).
    Response {
        status: reqwest::StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// No HTTP response was obtained (network error, timeout, cancellation).
    HardFailure { detail: String },
}

/// A health-tracked, round-robin selector and forwarder over a fixed set of
/// upstream endpoints.
pub struct Pool {
    endpoints: Vec<Endpoint>,
    options: PoolOptions,
    cursor: AtomicUsize,
    last_used: Mutex<Option<EndpointStatus>>,
    route_id: Option<String>,
    alert_sink: Option<AlertSink>,
    client: reqwest::Client,
}

impl Pool {
    pub fn new(
        configs: &[EndpointConfig],
        options: PoolOptions,
        route_id: Option<String>,
        alert_sink: Option<AlertSink>,
    ) -> Result<Self, PoolError> {
        if configs.is_empty() {
            return Err(PoolError::NoEndpointsConfigured);
        }
        for config in configs {
            url::Url::parse(&config.url)?;
        }

        let endpoints = configs
            .iter()
            .enumerate()
            .map(|(i, c)| Endpoint::from_config(i, c))
            .collect::<Vec<_>>();

        info!(endpoints = endpoints.len(), route = ?route_id, "pool initialized");

        Ok(Self {
            endpoints,
            options,
            cursor: AtomicUsize::new(0),
            last_used: Mutex::new(None),
            route_id,
            alert_sink,
            client: reqwest::Client::new(),
        })
    }

    /// Select an endpoint for `methods` (empty = no method filter), advancing
    /// the round-robin cursor exactly once. Never fails: a pool with at
    /// least one endpoint always returns one, falling back to unhealthy or
    /// method-mismatched endpoints rather than erroring.
    pub fn select(&self, methods: &[String]) -> &Endpoint {
        let method_filtered: Vec<&Endpoint> = if methods.is_empty() {
            self.endpoints.iter().collect()
        } else {
            self.endpoints
                .iter()
                .filter(|e| e.supports_all(methods))
                .collect()
        };

        let healthy: Vec<&Endpoint> = method_filtered
            .iter()
            .copied()
            .filter(|e| e.is_healthy())
            .collect();

        let candidates: Vec<&Endpoint> = if healthy.len() >= self.options.min_healthy {
            healthy
        } else {
            method_filtered
        };

        let candidates: Vec<&Endpoint> = if !candidates.is_empty() {
            candidates
        } else {
            // Method filter excluded everything: fall back to healthy
            // endpoints ignoring the filter, then to the full endpoint set.
            let healthy_any: Vec<&Endpoint> =
                self.endpoints.iter().filter(|e| e.is_healthy()).collect();
            if !healthy_any.is_empty() {
                healthy_any
            } else {
                self.endpoints.iter().collect()
            }
        };

        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates[idx]
    }

    /// Forward `body` to a selected endpoint, recording the outcome.
    pub async fn forward(
        &self,
        body: Bytes,
        caller_headers: &HeaderMap,
        methods: &[String],
    ) -> ForwardResult {
        let endpoint = self.select(methods);
        *self.last_used.lock() = Some(endpoint.status());

        let outbound_headers = merge_outbound(caller_headers, &endpoint.headers);
        let request = self
            .client
            .post(&endpoint.url)
            .headers(outbound_headers)
            .body(body);

        let start = Instant::now();
        let timeout = endpoint.timeout_ms.map(Duration::from_millis);

        let outcome = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, request.send()).await,
            None => Ok(request.send().await),
        };

        match outcome {
            Err(_) => {
                self.record_hard_failure(endpoint, "request timed out".to_string());
                ForwardResult::HardFailure {
                    detail: "request timed out".to_string(),
                }
            }
            Ok(Err(err)) => {
                let detail = err.to_string();
                self.record_hard_failure(endpoint, detail.clone());
                ForwardResult::HardFailure { detail }
            }
            Ok(Ok(response)) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let status = response.status();
                let headers = strip_hop_by_hop(response.headers());
                let body = response.bytes().await.unwrap_or_default();

                let outcome = if status.is_success() {
                    ForwardOutcome::Success { latency_ms }
                } else {
                    ForwardOutcome::SoftFailure {
                        latency_ms,
                        detail: format!("HTTP {status}"),
                    }
                };

                debug!(endpoint = %endpoint.id, status = %status, latency_ms, "forwarded request");

                if endpoint.record_outcome(&outcome, self.options.failure_threshold) {
                    self.raise_alert(endpoint);
                }

                ForwardResult::Response {
                    status,
                    headers,
                    body,
                }
            }
        }
    }

    fn record_hard_failure(&self, endpoint: &Endpoint, detail: String) {
        let outcome = ForwardOutcome::HardFailure { detail };
        if endpoint.record_outcome(&outcome, self.options.failure_threshold) {
            self.raise_alert(endpoint);
        }
    }

    fn raise_alert(&self, endpoint: &Endpoint) {
        let Some(sink) = &self.alert_sink else {
            return;
        };
        let status = endpoint.status();
        let event = AlertEvent::new(
            status.id,
            status.url,
            self.route_id.clone(),
            status.consecutive_failures,
            status.last_error,
        );
        dispatch(sink, event);
    }

    /// Manually mark an endpoint healthy by id or URL. No-op if not found.
    pub fn mark_healthy(&self, id_or_url: &str) {
        if let Some(endpoint) = self.find(id_or_url) {
            endpoint.mark_healthy();
        }
    }

    /// Manually mark an endpoint unhealthy by id or URL. No-op if not found.
    pub fn mark_unhealthy(&self, id_or_url: &str, reason: Option<String>) {
        if let Some(endpoint) = self.find(id_or_url) {
            if endpoint.mark_unhealthy(reason) {
                self.raise_alert(endpoint);
            }
        }
    }

    fn find(&self, id_or_url: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.id == id_or_url || e.url == id_or_url)
    }

    /// Snapshot of every endpoint's health, in configuration order.
    pub fn status(&self) -> Vec<EndpointStatus> {
        self.endpoints.iter().map(Endpoint::status).collect()
    }

    /// The endpoint last selected by `forward`, if any.
    pub fn last_used(&self) -> Option<EndpointStatus> {
        self.last_used.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(urls: &[&str]) -> Vec<EndpointConfig> {
        urls.iter().map(|u| EndpointConfig::new(*u)).collect()
    }

    #[test]
    fn construction_rejects_empty_endpoint_list() {
        let pool = Pool::new(&[], PoolOptions::default(), None, None);
        assert!(matches!(pool, Err(PoolError::NoEndpointsConfigured)));
    }

    #[test]
    fn round_robin_cycles_through_all_endpoints() {
        let pool = Pool::new(
            &configs(&["https://a", "https://b", "https://c"]),
            PoolOptions::default(),
            None,
            None,
        )
        .unwrap();

        let first = pool.select(&[]).id.clone();
        let second = pool.select(&[]).id.clone();
        let third = pool.select(&[]).id.clone();
        let fourth = pool.select(&[]).id.clone();

        assert_eq!(first, "endpoint-0");
        assert_eq!(second, "endpoint-1");
        assert_eq!(third, "endpoint-2");
        assert_eq!(fourth, first);
    }

    #[test]
    fn single_endpoint_pool_always_returns_it_even_when_unhealthy() {
        let pool = Pool::new(&configs(&["https://a"]), PoolOptions::default(), None, None).unwrap();
        pool.mark_unhealthy("endpoint-0", Some("down".into()));
        assert_eq!(pool.select(&[]).id, "endpoint-0");
    }

    #[test]
    fn falls_back_to_full_candidate_set_below_min_healthy() {
        let options = PoolOptions {
            failure_threshold: 3,
            min_healthy: 2,
        };
        let pool = Pool::new(&configs(&["https://a", "https://b"]), options, None, None).unwrap();
        pool.mark_unhealthy("endpoint-0", Some("down".into()));

        let first = pool.select(&[]).id.clone();
        let second = pool.select(&[]).id.clone();
        let mut seen = vec![first, second];
        seen.sort();
        assert_eq!(seen, vec!["endpoint-0", "endpoint-1"]);
    }

    #[test]
    fn method_filter_excludes_non_supporting_endpoints() {
        let mut restricted = EndpointConfig::new("https://a");
        restricted.methods = Some(["getSlot".to_string()].into_iter().collect());
        let open = EndpointConfig::new("https://b");

        let pool = Pool::new(
            &[restricted, open],
            PoolOptions::default(),
            None,
            None,
        )
        .unwrap();

        let selected = pool.select(&["getProgramAccounts".to_string()]);
        assert_eq!(selected.id, "endpoint-1");
    }

    #[test]
    fn mark_healthy_then_unhealthy_round_trips_through_pool() {
        let pool = Pool::new(&configs(&["https://a"]), PoolOptions::default(), None, None).unwrap();
        pool.mark_unhealthy("https://a", Some("boom".into()));
        assert!(!pool.status()[0].healthy);
        pool.mark_healthy("https://a");
        assert!(pool.status()[0].healthy);
    }
}
