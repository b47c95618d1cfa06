use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};
use config::Config;
use log::LevelFilter;

/// Edge process of one bookstore service: authenticates callers against the user service and
/// reports every request to the logging service.
#[derive(Debug, Parser)]
#[command(name = "bookstore", version)]
pub struct Args {
    /// Address to listen on. Falls back to `server.listen_address`, then 127.0.0.1:8000.
    #[arg(short, long, env = "BOOKSTORE_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,
    /// Path to the TOML configuration file. Defaults apply when the file does not exist.
    #[arg(long, short, env = "BOOKSTORE_CONFIG_PATH", default_value = "./bookstore.toml")]
    pub config: PathBuf,
    /// Name stamped on every telemetry record. Overrides `server.service_name`.
    #[arg(long, env = "BOOKSTORE_SERVICE_NAME")]
    pub service_name: Option<String>,
    /// Log level of the bookstore crates. Dependencies log warnings and above.
    #[arg(long = "log", env = "BOOKSTORE_LOG", default_value = "info")]
    pub log_level: LevelFilter,
    /// Log output format. Colored text on a terminal, plain text otherwise.
    #[arg(long, env = "BOOKSTORE_LOG_STYLE")]
    pub log_style: Option<LogStyle>,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            log::info!("No configuration at {}, using defaults", self.config.display());

            let config = Config::default();
            config.validate()?;
            config
        };

        if let Some(service_name) = &self.service_name {
            config.server.service_name.clone_from(service_name);
        }

        Ok(config)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogStyle {
    Color,
    Text,
    Json,
}
