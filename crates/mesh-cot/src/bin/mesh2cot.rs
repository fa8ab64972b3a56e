//! mesh2cot - forward mesh radio position reports to a TAK network
//!
//! Reads the mesh client's decoded notifications as JSON lines and sends one CoT event per
//! position packet to `ATAK_HOST:ATAK_PORT` over UDP.

use anyhow::{Context, Result};
use clap::Parser;
use mesh_cot::{
    config::Config,
    dispatch::Dispatcher,
    source::{open_input, spawn_reader},
    transport::UdpSink,
};
use tracing::{info, Level};

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose() {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let dest = config
        .destination()
        .context("Invalid CoT destination")?;
    let input = open_input(&config.input)
        .with_context(|| format!("Failed to open mesh interface {:?}", config.input))?;

    info!("Sending CoT to {}", dest);
    let dispatcher = Dispatcher::new(config.unit_profile(), UdpSink::new(dest, config.mcast_ttl));
    let stats = dispatcher.run(spawn_reader(input));
    info!(
        "Mesh input closed: {} packets, {} sent, {} skipped, {} dropped, {} failed",
        stats.packets, stats.sent, stats.skipped, stats.dropped, stats.failed
    );
    Ok(())
}
