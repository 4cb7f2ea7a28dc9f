//! Routes bind a [`Pool`] to a method filter and an id.

use crate::alert::AlertSink;
use crate::endpoint::EndpointConfig;
use crate::error::GatewayError;
use crate::pool::{Pool, PoolOptions};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declarative configuration for one route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Unique id within the gateway.
    pub id: String,

    /// Upstream endpoints for this route's pool.
    pub endpoints: Vec<EndpointConfig>,

    /// Methods this route accepts. `None` matches any method; routes with
    /// a filter should be declared before an unfiltered catch-all route,
    /// since routes are matched in declaration order.
    #[serde(default)]
    pub methods: Option<HashSet<String>>,

    /// Failure threshold / minimum-healthy overrides for this route's pool.
    #[serde(default)]
    pub failure_threshold: Option<u32>,
    #[serde(default)]
    pub min_healthy: Option<usize>,
}

/// A runtime route: an id, an optional method filter, and the pool serving it.
pub struct Route {
    pub id: String,
    pub methods: Option<HashSet<String>>,
    pub pool: Pool,
}

impl Route {
    pub fn from_config(config: &RouteConfig, alert_sink: Option<AlertSink>) -> Result<Self, GatewayError> {
        let defaults = PoolOptions::default();
        let options = PoolOptions {
            failure_threshold: config.failure_threshold.unwrap_or(defaults.failure_threshold),
            min_healthy: config.min_healthy.unwrap_or(defaults.min_healthy),
        };

        let pool = Pool::new(
            &config.endpoints,
            options,
            Some(config.id.clone()),
            alert_sink,
        )
        .map_err(|source| GatewayError::RouteConfig {
            route_id: config.id.clone(),
            source,
        })?;

        Ok(Self {
            id: config.id.clone(),
            methods: config.methods.clone(),
            pool,
        })
    }

    /// Whether this route accepts a request whose extracted methods are
    /// `methods`. A route with no filter matches anything. A route with a
    /// filter matches only if every extracted method is in the filter.
    pub fn matches(&self, methods: &[String]) -> bool {
        match &self.methods {
            None => true,
            Some(allowed) => methods.iter().all(|m| allowed.contains(m)),
        }
    }
}
