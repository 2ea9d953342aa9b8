/*!
 * Prelude module for MALOS Core.
 *
 * This module re-exports commonly used types and functions from the MALOS Core crate
 * to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export addressing types
pub use crate::types::{
    ChannelRole, DriverAddress, DriverDescriptor, DriverKind, Endpoint, PORTS_PER_DRIVER,
};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, SharedConfig, TimingConfig, TransportKind};

// Re-export utility functions
pub use crate::utils::{sleep_unless_cancelled, spawn_and_log, with_timeout};

// Re-export shutdown signal
pub use tokio_util::sync::CancellationToken;

// Re-export logging macros
pub use tracing::{debug, error, info, trace, warn};
