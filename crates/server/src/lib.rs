//! Bookstore edge server library.
//!
//! Provides the request envelope every service endpoint runs through, and a reusable server
//! function to serve it either for the binary or for the integration tests.

#![deny(missing_docs)]

mod envelope;
mod error;
mod health;
mod session;

use std::net::SocketAddr;

use anyhow::anyhow;
use axum::{Router, routing::get};
use config::Config;
use tokio::net::TcpListener;

pub use envelope::{Access, Envelope, Operation};
pub use error::ServiceError;
pub use identity::VerifiedIdentity;

/// Configuration for serving the bookstore.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized TOML configuration.
    pub config: Config,
    /// Business routes of the hosting service. Their handlers receive the [`Envelope`] as state.
    pub routes: Router<Envelope>,
}

/// Builds the application router: the given business routes plus the built-in endpoints, all
/// sharing one [`Envelope`].
pub fn router(config: &Config, routes: Router<Envelope>) -> anyhow::Result<Router> {
    let envelope = Envelope::from_config(config)?;

    let mut app = routes.route(session::ME_PATH, get(session::me));

    if config.server.health.enabled {
        app = app.route(&config.server.health.path, get(health::health));
    }

    Ok(app.with_state(envelope))
}

/// Starts and runs the server until ctrl-c is received.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        routes,
    }: ServeConfig,
) -> anyhow::Result<()> {
    let app = router(&config, routes)?;

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    log::info!(
        "Service '{}' listening on http://{listen_address}",
        config.server.service_name
    );

    log::info!("Verifying credentials against {}", config.identity.url);

    if config.telemetry.enabled {
        log::info!("Shipping telemetry to {}", config.telemetry.url);
    } else {
        log::warn!("Telemetry sink disabled, request records will not leave this process");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }

    log::info!("Shutdown signal received, draining in-flight requests");
}
