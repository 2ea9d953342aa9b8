/*!
 * MALOS Client
 *
 * Starts the declared MALOS drivers of a MATRIX Creator device and gives
 * access to their behaviors: the driver registry, two-phase startup and
 * structured shutdown.
 */

#![warn(missing_docs)]

pub mod client;
pub mod registry;

pub use client::{transport_for, Client, FailedDriver, RunningDriver};
pub use registry::{DriverFactory, DriverRegistry};

/// MALOS client crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
