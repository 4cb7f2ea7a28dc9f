//! Gateway entry point.
//!
//! Loads a [`GatewayConfig`] from YAML, builds a [`Gateway`], and serves it
//! until `SIGINT`/`SIGTERM`. This binary owns the process exit-code
//! convention: configuration or bind failures exit `1`, a clean shutdown
//! exits `0`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use jrpc_gateway::{config::CONFIG_PATH_ENV, Gateway, GatewayConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rpc-gateway", about = "JSON-RPC reverse proxy and health-aware load balancer")]
struct Args {
    /// Path to the gateway's YAML config file. Falls back to the
    /// GATEWAY_CONFIG environment variable, then `gateway.yml`.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port) from the config file.
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable verbose (debug-level) logging, overriding RUST_LOG.
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_path(args: &Args) -> String {
    args.config
        .clone()
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| "gateway.yml".to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    let path = config_path(&args);
    let mut config = match GatewayConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            error!(path = %path, error = %err, "failed to load gateway config");
            return ExitCode::FAILURE;
        }
    };

    if let Some(listen) = &args.listen {
        match listen.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => {
                    config.host = host.to_string();
                    config.port = port;
                }
                Err(_) => {
                    error!(listen = %listen, "--listen must be in host:port form");
                    return ExitCode::FAILURE;
                }
            },
            None => {
                error!(listen = %listen, "--listen must be in host:port form");
                return ExitCode::FAILURE;
            }
        }
    }

    let gateway = match Gateway::from_config(&config, None) {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            error!(error = %err, "failed to build gateway");
            return ExitCode::FAILURE;
        }
    };

    let shutdown_gateway = Arc::clone(&gateway);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        shutdown_gateway.stop();
    });

    match gateway.start().await {
        Ok(()) => {
            info!("gateway shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "gateway exited with an error");
            ExitCode::FAILURE
        }
    }
}

/// Resolves when either `SIGINT` or `SIGTERM` (on Unix) is received.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
