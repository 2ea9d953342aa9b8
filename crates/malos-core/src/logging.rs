/*!
 * Logging functionality for the MALOS client.
 *
 * This module provides tracing setup and the spans every driver lane runs in.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::types::{ChannelRole, DriverDescriptor};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system from the logging section of the configuration
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    install(&config.level, config.with_target)
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "malos_zigbee=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    install(filter, true)
}

fn install(filter: &str, with_target: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(with_target))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create the span a driver's setup runs in
pub fn driver_span(descriptor: &DriverDescriptor) -> Span {
    tracing::info_span!(
        "driver",
        name = %descriptor.name,
        host = %descriptor.address.host,
        port = descriptor.address.base_port
    )
}

/// Create the span one channel lane of a driver runs in
pub fn lane_span(descriptor: &DriverDescriptor, role: ChannelRole) -> Span {
    tracing::info_span!(
        "lane",
        driver = %descriptor.name,
        role = %role,
        port = descriptor.address.port(role).unwrap_or(descriptor.address.base_port)
    )
}
