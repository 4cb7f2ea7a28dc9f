//! # jrpc-gateway
//!
//! A chain-agnostic reverse proxy for JSON-RPC over HTTP. Downstream clients
//! send single or batch JSON-RPC 2.0 requests; the gateway classifies each
//! request by method, resolves one of its configured routes, and forwards
//! the request verbatim through that route's health-tracked pool of
//! upstream endpoints.
//!
//! ## Layout
//!
//! - **[`endpoint`]**: upstream endpoint configuration and per-endpoint health state.
//! - **[`pool`]**: the round-robin, health-aware selector and forwarder.
//! - **[`route`]**: binds a pool to a method filter and an id.
//! - **[`gateway`]**: the HTTP front-end: CORS, method/size gates, JSON-RPC
//!   parsing, route resolution, and error shaping.
//! - **[`jsonrpc`]**: envelope parsing and JSON-RPC error shaping, independent
//!   of any HTTP framework.
//! - **[`alert`]**: the fire-and-forget alert event contract raised on
//!   healthy -> unhealthy transitions.
//! - **[`headers`]**: hop-by-hop header stripping and merge order shared by
//!   the pool and gateway.
//! - **[`config`]**: YAML configuration loading and validation.
//! - **[`metrics`]**: optional Prometheus gauges built from gateway status.
//!
//! ## Example
//!
//! ```rust,no_run
//! use jrpc_gateway::{Gateway, GatewayConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::load("gateway.yml")?;
//!     let gateway = Arc::new(Gateway::from_config(&config, None)?);
//!     gateway.start().await?;
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod headers;
pub mod jsonrpc;
pub mod metrics;
pub mod pool;
pub mod route;

pub use alert::{AlertEvent, AlertSink};
pub use config::{CorsConfig, GatewayConfig};
pub use endpoint::{Endpoint, EndpointConfig, EndpointStatus, ForwardOutcome};
pub use error::{GatewayError, PoolError};
pub use gateway::{Gateway, RouteStatus};
pub use pool::{ForwardResult, Pool, PoolOptions};
pub use route::{Route, RouteConfig};
