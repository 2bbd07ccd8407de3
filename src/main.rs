//! qserv - channel service pseudo-server.

use std::sync::Arc;

use anyhow::Context;
use qserv::config::{Config, LogConfig, LogFormat};
use qserv::link::LinkDriver;
use qserv::services::ServiceContext;
use qserv::store::Stores;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "QSERV_CONFIG";
const DEFAULT_CONFIG: &str = "qserv.toml";

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    let config = Config::load_validated(&config_path)
        .with_context(|| format!("loading {config_path}"))?;
    init_tracing(&config.log);

    info!(
        server = %config.server.name,
        sid = %config.server.sid,
        protocol = config.protocol.as_str(),
        uplink = %config.uplink.address(),
        "Starting qserv"
    );

    let stores = Stores::open(&config.storage).map_err(|e| {
        error!(error = %e, "Failed to open stores");
        e
    })?;
    info!(
        accounts = stores.accounts.len(),
        channels = stores.registry.len(),
        "Stores loaded"
    );

    let ctx = Arc::new(ServiceContext::new(Arc::new(config), Arc::new(stores)));

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for interrupt"),
        }
        let _ = shutdown_tx.send(());
    });

    LinkDriver::new(ctx).run(shutdown_rx).await?;
    info!("qserv stopped");
    Ok(())
}
