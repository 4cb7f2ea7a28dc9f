//! Gateway configuration: file format, environment override, and validation.

use crate::error::GatewayError;
use crate::route::RouteConfig;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// CORS contract for the gateway's HTTP surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Empty means allow any origin (`*`).
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allowed methods advertised on preflight. Defaults to `POST, OPTIONS`.
    #[serde(default = "default_cors_methods")]
    pub allowed_methods: Vec<String>,

    /// Allowed headers advertised on preflight. Defaults to `content-type`.
    #[serde(default = "default_cors_headers")]
    pub allowed_headers: Vec<String>,
}

fn default_cors_methods() -> Vec<String> {
    vec!["POST".to_string(), "OPTIONS".to_string()]
}

fn default_cors_headers() -> Vec<String> {
    vec!["content-type".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: default_cors_methods(),
            allowed_headers: default_cors_headers(),
        }
    }
}

/// Top-level gateway configuration, deserializable from YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address to bind. Defaults to `0.0.0.0`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Routes, matched in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Route used when no route's method filter matches.
    #[serde(default)]
    pub default_route_id: Option<String>,

    /// Global method allowlist. `None` disables the gate.
    #[serde(default)]
    pub allowed_methods: Option<HashSet<String>>,

    /// CORS contract. `None` disables CORS handling entirely.
    #[serde(default)]
    pub cors: Option<CorsConfig>,

    /// Maximum accepted request body size, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Path that returns a bare `200 OK` without entering the JSON-RPC
    /// pipeline, for load balancer liveness probes.
    #[serde(default)]
    pub health_check_path: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_body_bytes() -> usize {
    1_000_000
}

/// Environment variable naming a config file path, checked before the
/// explicit `--config` flag default.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

impl GatewayConfig {
    /// Load from a YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GatewayError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&text).map_err(|source| GatewayError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants that serde's defaults cannot express.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.routes.is_empty() {
            return Err(GatewayError::NoRoutesConfigured);
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.id.clone()) {
                return Err(GatewayError::DuplicateRouteId(route.id.clone()));
            }
            if route.endpoints.is_empty() {
                return Err(GatewayError::RouteConfig {
                    route_id: route.id.clone(),
                    source: crate::error::PoolError::NoEndpointsConfigured,
                });
            }
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointConfig;

    fn route(id: &str) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            endpoints: vec![EndpointConfig::new("https://rpc.example.com")],
            methods: None,
            failure_threshold: None,
            min_healthy: None,
        }
    }

    #[test]
    fn rejects_empty_routes() {
        let config = GatewayConfig {
            host: default_host(),
            port: 8080,
            routes: vec![],
            default_route_id: None,
            allowed_methods: None,
            cors: None,
            max_body_bytes: default_max_body_bytes(),
            health_check_path: None,
        };
        assert!(matches!(config.validate(), Err(GatewayError::NoRoutesConfigured)));
    }

    #[test]
    fn rejects_duplicate_route_ids() {
        let config = GatewayConfig {
            host: default_host(),
            port: 8080,
            routes: vec![route("default"), route("default")],
            default_route_id: None,
            allowed_methods: None,
            cors: None,
            max_body_bytes: default_max_body_bytes(),
            health_check_path: None,
        };
        assert!(matches!(
            config.validate(),
            Err(GatewayError::DuplicateRouteId(_))
        ));
    }

    #[test]
    fn deserializes_minimal_yaml() {
        let yaml = r#"
port: 8080
routes:
  - id: default
    endpoints:
      - url: https://rpc.example.com
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.max_body_bytes, 1_000_000);
    }
}
