use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use args::Args;
use axum::Router;
use clap::Parser;
use config::Config;
use server::ServeConfig;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args)?;

    let config = args.config()?;

    log::info!("Starting {}", config.server.service_name);

    // The envelope binds its instruments when the router is built, so the provider goes first.
    let telemetry = telemetry::init(&config.server.service_name, &config.metrics)?;

    if let Err(e) = server::serve(serve_config(&args, config)).await {
        log::error!("Server failed to start: {e}");
        drop(telemetry);
        std::process::exit(1);
    }

    if let Err(e) = telemetry.force_flush() {
        log::warn!("{e}");
    }

    Ok(())
}

fn serve_config(args: &Args, config: Config) -> ServeConfig {
    let listen_address = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8000)));

    ServeConfig {
        listen_address,
        config,
        routes: Router::new(),
    }
}
