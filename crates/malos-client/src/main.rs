use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use malos_client::Client;
use malos_core::config::{Config, ConfigBuilder};
use malos_core::logging;
use malos_zigbee::{GatewayState, ZigbeeDriver};

/// Configure and drive the MALOS drivers of a MATRIX Creator
///
/// Messages are JSON encoded; a stock MALOS daemon expects protobuf frames.
#[derive(Debug, Parser)]
#[command(name = "malos-client", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); messages on the wire are JSON
    #[arg(short, long, env = "MALOS_CONFIG")]
    config: Option<PathBuf>,

    /// Host running the MALOS daemon, overriding the configuration
    #[arg(long)]
    host: Option<String>,

    /// Log filter, overriding the configuration (RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,

    /// Open a join window once the gateway network is up
    #[arg(long)]
    permit_join: bool,

    /// Toggle the first discovered device once
    #[arg(long)]
    toggle_first: bool,

    /// Seconds to wait for each gateway answer
    #[arg(long, default_value_t = 10)]
    gateway_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = ConfigBuilder::new().with_environment_prefix("MALOS");
    if let Some(path) = &cli.config {
        builder = builder.with_config_file(path);
    }
    let mut config = builder.build().context("Failed to load configuration")?;

    if let Some(host) = &cli.host {
        config.device.host = host.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    logging::init_from_config(&config.logging)?;

    run(cli, config).await
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    if config.drivers.is_empty() {
        warn!("No drivers declared; nothing to do");
    }

    let join_window = Duration::from_secs(u64::from(config.timing.permit_join_secs));
    let client = Client::connect(config).await?;

    for failed in client.failed_drivers() {
        warn!("{} is not running: {}", failed.descriptor, failed.error);
    }

    let timeout = Duration::from_secs(cli.gateway_timeout);
    let (permit_join, toggle_first) = (cli.permit_join, cli.toggle_first);
    let operation = client.gateway().map(|gateway| {
        tokio::spawn(async move {
            let operated =
                operate_gateway(&gateway, permit_join, toggle_first, timeout, join_window).await;
            if let Err(e) = operated {
                warn!("Gateway operation stopped: {:#}", e);
            }
        })
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    if let Some(operation) = operation {
        operation.abort();
    }
    client.shutdown();
    client.join().await;

    Ok(())
}

async fn operate_gateway(
    gateway: &ZigbeeDriver,
    permit_join: bool,
    toggle_first: bool,
    timeout: Duration,
    join_window: Duration,
) -> Result<()> {
    gateway.check_gateway_active().await?;
    gateway
        .wait_for_state(GatewayState::AwaitingNetworkStatus, timeout)
        .await
        .context("Gateway did not report an active proxy")?;

    gateway.request_network_status().await?;

    if permit_join {
        gateway
            .wait_for_state(GatewayState::AwaitingDeviceDiscovery, timeout)
            .await
            .context("Gateway network did not come up")?;
        gateway.permit_join().await?;
    }

    if toggle_first {
        gateway
            .wait_for_state(GatewayState::DevicesDiscovered, join_window + timeout)
            .await
            .context("No device was discovered")?;

        if let Some(device) = gateway.directory().first() {
            info!("Toggling device {}", device.name());
            device.toggle().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_names_wire_encoding() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("protobuf"));
    }

    #[test]
    fn test_gateway_flags() {
        let cli = Cli::parse_from(["malos-client", "--permit-join", "--gateway-timeout", "3"]);
        assert!(cli.permit_join);
        assert!(!cli.toggle_first);
        assert_eq!(cli.gateway_timeout, 3);
    }
}
