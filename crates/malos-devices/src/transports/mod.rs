/*!
 * Transport implementations for the MALOS client.
 */

pub mod memory;

#[cfg(feature = "zmq")]
pub mod zmq;

pub use memory::MemoryTransport;

#[cfg(feature = "zmq")]
pub use zmq::ZmqTransport;
