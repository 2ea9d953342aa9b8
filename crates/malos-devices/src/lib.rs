/*!
 * MALOS Devices
 *
 * This crate provides the driver behaviors, message codec and channel
 * transports of the MALOS client, together with the channel manager that
 * runs each driver's lanes.
 */

#![warn(missing_docs)]

// Re-export core types
pub use malos_core::prelude;

pub mod channel;
pub mod codec;
pub mod driver;
pub mod drivers;
pub mod messages;
pub mod transport;
pub mod transports;

pub use channel::{ChannelManager, DriverLanes};
pub use codec::{JsonCodec, MessageCodec, SharedCodec};
pub use driver::{ConfigPusher, DriverBehavior, DriverContext, SharedDriver};
pub use transport::{PushChannel, SharedTransport, SubscribeChannel, Transport};

/// MALOS devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Names of the transports compiled into this crate
pub fn available_transports() -> Vec<&'static str> {
    let mut transports = vec!["memory"];

    #[cfg(feature = "zmq")]
    transports.push("zmq");

    transports
}
