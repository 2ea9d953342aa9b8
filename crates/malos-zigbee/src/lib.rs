/*!
 * MALOS ZigBee
 *
 * Management of the MALOS ZigBee gateway: the state machine negotiating
 * gateway reset, network creation and device discovery, the directory of
 * discovered devices and the proxies used to control them.
 */

#![warn(missing_docs)]

pub mod device;
pub mod directory;
pub mod driver;
pub mod machine;
pub mod state;

pub use device::{CachedState, ZigbeeDevice};
pub use directory::DeviceDirectory;
pub use driver::ZigbeeDriver;
pub use machine::{GatewayAction, GatewayCommand, GatewayStateMachine};
pub use state::GatewayState;

/// MALOS ZigBee crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
