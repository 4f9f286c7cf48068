//! DMM Cast WebDAV server binary.
//!
//! Exposes debrid cast links as a read-only WebDAV collection of `.strm`
//! pointer files, one mount per provider. The main entry point builds the
//! shared upstream client and resolution cache, assembles the Axum router
//! and starts the HTTP listener.

mod auth;
mod cache;
mod config;
mod error;
mod frontend;
mod health;
mod http;
mod logging;
mod pages;
mod provider;
mod routes;
#[cfg(test)]
mod test_support;
mod vfs;
mod webdav;

use axum::extract::connect_info::ConnectInfo;
use axum::http::Request;
use axum::routing::get;
use axum::{Router, middleware};
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::config::{Args, RESOLUTION_CACHE_TTL_SECS, UPSTREAM_USER_AGENT};
use crate::http::{build_cors_layer, resolve_client_ip};
use crate::provider::torbox::ResolutionCache;
use crate::routes::{build_mounts, mount_router};

shadow!(build);

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Starts the server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let client = reqwest::Client::builder()
        .user_agent(UPSTREAM_USER_AGENT)
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .map_err(std::io::Error::other)?;
    let cache = Arc::new(ResolutionCache::new(Duration::from_secs(
        RESOLUTION_CACHE_TTL_SECS,
    )));

    let mut app = Router::new().route("/health", get(health::health));
    for mount in build_mounts(&args, &client, &cache) {
        info!(provider = mount.id(), mount = mount.path(), "mounting provider");
        app = app.merge(mount_router(mount));
    }

    let mut app = app
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.ip());
                    let client_ip = resolve_client_ip(request.headers(), connect_ip)
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        );

    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!("🚀 Starting HTTP server at {}", addr);

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
