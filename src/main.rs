use clap::Parser;
use log::{error, info};
use modemmanager_bridge::config::{self, Cli};
use modemmanager_bridge::{logging, manager::Daemon, systemd};
use std::process;

#[tokio::main]
async fn main() {
    log_panics::init();

    let cli = Cli::parse();
    logging::init(config::verbose_requested(&cli));

    if let Err(e) = run().await {
        error!("application error: {e:#}");
        process::exit(1);
    }

    info!("application shutdown");
}

async fn run() -> anyhow::Result<()> {
    let connection = zbus::Connection::system().await?;
    let daemon = Daemon::new(connection);
    daemon.run().await?;

    systemd::sd_notify_ready();

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");

    Ok(())
}
