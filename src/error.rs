//! Error types for the gateway.

use thiserror::Error;

/// Errors that can occur while constructing or selecting from a [`crate::pool::Pool`].
#[derive(Error, Debug)]
pub enum PoolError {
    /// A pool was constructed with no endpoints.
    #[error("no endpoints configured for pool")]
    NoEndpointsConfigured,

    /// An endpoint config carried an unparseable URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for PoolError {
    fn from(err: url::ParseError) -> Self {
        PoolError::InvalidUrl(err.to_string())
    }
}

/// Errors that can occur while constructing or loading the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A gateway was constructed with no routes.
    #[error("no routes configured for gateway")]
    NoRoutesConfigured,

    /// Two routes were configured with the same id.
    #[error("duplicate route id: {0}")]
    DuplicateRouteId(String),

    /// A route's pool failed to construct.
    #[error("route {route_id}: {source}")]
    RouteConfig {
        route_id: String,
        #[source]
        source: PoolError,
    },

    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed as YAML.
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The listener failed to bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
