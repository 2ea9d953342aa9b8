/*!
 * Driver implementations for the MALOS client.
 *
 * The ZigBee gateway lives in its own crate.
 */

pub mod everloop;
pub mod humidity;
pub mod sensor;
pub mod uv;

pub use everloop::EverloopDriver;
pub use humidity::HumidityDriver;
pub use sensor::{Sensor, SensorDriver};
pub use uv::UvDriver;
