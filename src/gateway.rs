//! HTTP front-end: parses JSON-RPC, resolves a route, and forwards through
//! its pool.

use crate::alert::AlertSink;
use crate::config::{CorsConfig, GatewayConfig};
use crate::error::GatewayError;
use crate::jsonrpc::{self, RpcBody};
use crate::pool::ForwardResult;
use crate::route::{Route, RouteConfig};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-route health snapshot returned by [`Gateway::status`].
#[derive(Serialize)]
pub struct RouteStatus {
    pub id: String,
    pub methods: Option<HashSet<String>>,
    pub endpoints: Vec<crate::endpoint::EndpointStatus>,
}

/// The JSON-RPC reverse proxy: an ordered set of routes plus the gates
/// (CORS, method, body size, global allowlist) applied before a request
/// reaches a route's pool.
pub struct Gateway {
    routes: Vec<Route>,
    allowed_methods: Option<HashSet<String>>,
    default_route_id: Option<String>,
    max_body_bytes: usize,
    cors: Option<CorsConfig>,
    health_check_path: Option<String>,
    bind_addr: String,
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn from_config(config: &GatewayConfig, alert_sink: Option<AlertSink>) -> Result<Self, GatewayError> {
        if config.routes.is_empty() {
            return Err(GatewayError::NoRoutesConfigured);
        }

        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(config.routes.len());
        for route_config in &config.routes {
            if !seen.insert(route_config.id.clone()) {
                return Err(GatewayError::DuplicateRouteId(route_config.id.clone()));
            }
            routes.push(Route::from_config(route_config, alert_sink.clone())?);
        }

        info!(routes = routes.len(), "gateway initialized");

        Ok(Self {
            routes,
            allowed_methods: config.allowed_methods.clone(),
            default_route_id: config.default_route_id.clone(),
            max_body_bytes: config.max_body_bytes,
            cors: config.cors.clone(),
            health_check_path: config.health_check_path.clone(),
            bind_addr: config.bind_addr(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Build a single route with the rest of the gateway's gates, for
    /// embedding or testing without a full [`GatewayConfig`].
    pub fn single_route(route: RouteConfig, max_body_bytes: usize) -> Result<Self, GatewayError> {
        let route = Route::from_config(&route, None)?;
        Ok(Self {
            routes: vec![route],
            allowed_methods: None,
            default_route_id: None,
            max_body_bytes,
            cors: None,
            health_check_path: None,
            bind_addr: "0.0.0.0:0".to_string(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn router(self: Arc<Self>) -> Router {
        let mut router = Router::new()
            .route(
                "/",
                get(method_not_allowed)
                    .post(handle_rpc)
                    .options(handle_preflight)
                    .fallback(method_not_allowed),
            )
            .layer(DefaultBodyLimit::max(self.max_body_bytes.saturating_add(1)))
            .with_state(Arc::clone(&self));

        if let Some(path) = &self.health_check_path {
            router = router.route(path, get(handle_health));
        }

        router
    }

    /// Bind and serve until `stop` is called or the process receives a
    /// shutdown signal forwarded by the caller.
    pub async fn start(self: Arc<Self>) -> Result<(), GatewayError> {
        let addr: SocketAddr = self
            .bind_addr
            .parse()
            .map_err(|_| GatewayError::Bind {
                addr: self.bind_addr.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid address"),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: self.bind_addr.clone(),
                source,
            })?;

        info!(addr = %addr, "gateway listening");

        let shutdown = self.shutdown.clone();
        let router = Arc::clone(&self).router();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|source| GatewayError::Bind {
                addr: self.bind_addr.clone(),
                source,
            })
    }

    /// Signal the listening server to stop accepting new connections and
    /// let in-flight requests finish. Idempotent.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn status(&self) -> Vec<RouteStatus> {
        self.routes
            .iter()
            .map(|r| RouteStatus {
                id: r.id.clone(),
                methods: r.methods.clone(),
                endpoints: r.pool.status(),
            })
            .collect()
    }

    /// Direct access to a route's pool, for test harnesses and manual alerts.
    pub fn get_balancer(&self, route_id: &str) -> Option<&crate::pool::Pool> {
        self.routes.iter().find(|r| r.id == route_id).map(|r| &r.pool)
    }

    fn resolve_route(&self, methods: &[String]) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.matches(methods))
            .or_else(|| {
                self.default_route_id
                    .as_ref()
                    .and_then(|id| self.routes.iter().find(|r| &r.id == id))
            })
    }

    fn cors_headers(&self, origin: Option<&str>) -> Option<HeaderMap> {
        let cors = self.cors.as_ref()?;
        let mut headers = HeaderMap::new();

        let allow_origin = if cors.allowed_origins.is_empty() {
            "*".to_string()
        } else {
            match origin {
                Some(origin) if cors.allowed_origins.iter().any(|o| o == origin) => {
                    origin.to_string()
                }
                _ => cors.allowed_origins[0].clone(),
            }
        };
        if let Ok(value) = allow_origin.parse() {
            headers.insert(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if let Ok(value) = cors.allowed_methods.join(", ").parse() {
            headers.insert(axum::http::header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if let Ok(value) = cors.allowed_headers.join(", ").parse() {
            headers.insert(axum::http::header::ACCESS_CONTROL_ALLOW_HEADERS, value);
        }
        Some(headers)
    }
}

async fn handle_health() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        axum::Json(json!({"error": "Only POST is supported."})),
    )
        .into_response()
}

async fn handle_preflight(State(gateway): State<Arc<Gateway>>, headers: HeaderMap) -> Response {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    match gateway.cors_headers(origin) {
        Some(cors_headers) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            response.headers_mut().extend(cors_headers);
            response
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn handle_rpc(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > gateway.max_body_bytes {
        return with_cors(
            &gateway,
            &headers,
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                axum::Json(json!({"error": "Request body too large."})),
            )
                .into_response(),
        );
    }

    let parsed = jsonrpc::parse_body(&body);
    if matches!(parsed, RpcBody::Malformed) {
        return with_cors(
            &gateway,
            &headers,
            (
                StatusCode::OK,
                axum::Json(jsonrpc::shape_error(
                    &parsed,
                    jsonrpc::PARSE_ERROR,
                    "Parse error: Invalid JSON.",
                )),
            )
                .into_response(),
        );
    }

    let methods = jsonrpc::extract_methods(&parsed);
    if methods.is_empty() {
        return with_cors(
            &gateway,
            &headers,
            (
                StatusCode::OK,
                axum::Json(jsonrpc::shape_error(
                    &parsed,
                    jsonrpc::INVALID_REQUEST,
                    "Invalid Request.",
                )),
            )
                .into_response(),
        );
    }

    if let Some(allowed) = &gateway.allowed_methods {
        if let Some(rejected) = methods.iter().find(|m| !allowed.contains(*m)) {
            return with_cors(
                &gateway,
                &headers,
                (
                    StatusCode::OK,
                    axum::Json(jsonrpc::shape_error(
                        &parsed,
                        jsonrpc::METHOD_NOT_ALLOWED,
                        format!("Method not allowed: {rejected}"),
                    )),
                )
                    .into_response(),
            );
        }
    }

    let Some(route) = gateway.resolve_route(&methods) else {
        return with_cors(
            &gateway,
            &headers,
            (
                StatusCode::OK,
                axum::Json(jsonrpc::shape_error(
                    &parsed,
                    jsonrpc::METHOD_NOT_ALLOWED,
                    "Method not found.",
                )),
            )
                .into_response(),
        );
    };

    match route.pool.forward(body, &headers, &methods).await {
        ForwardResult::Response {
            status,
            headers: response_headers,
            body,
        } => {
            let mut response = (status, body).into_response();
            response.headers_mut().extend(response_headers);
            with_cors(&gateway, &headers, response)
        }
        ForwardResult::HardFailure { detail } => {
            warn!(route = %route.id, error = %detail, "upstream request failed");
            with_cors(
                &gateway,
                &headers,
                (
                    StatusCode::BAD_GATEWAY,
                    axum::Json(json!({"error": "Bad Gateway: Upstream request failed."})),
                )
                    .into_response(),
            )
        }
    }
}

fn with_cors(gateway: &Gateway, request_headers: &HeaderMap, mut response: Response) -> Response {
    let origin = request_headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if let Some(cors_headers) = gateway.cors_headers(origin) {
        response.headers_mut().extend(cors_headers);
    }
    response
}
