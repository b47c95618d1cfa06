//! HTTP server configuration settings.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::HealthConfig;

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// The name stamped on every telemetry record this service emits.
    pub service_name: String,
    /// Health endpoint configuration.
    pub health: HealthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            service_name: "bookstore".to_string(),
            health: HealthConfig::default(),
        }
    }
}
