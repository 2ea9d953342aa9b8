/*!
 * MALOS Core
 *
 * Shared building blocks of the MALOS client: driver addressing, the error
 * taxonomy, configuration loading, logging setup and task helpers.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;
pub mod utils;

/// MALOS core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization with default logging
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("MALOS Core {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
