/*!
 * Ultraviolet sensor driver.
 */
use malos_core::error::Result;
use malos_core::types::DriverKind;

use crate::codec::MessageCodec;
use crate::drivers::sensor::{Sensor, SensorDriver};
use crate::messages::{DriverConfig, Uv};

/// The ultraviolet light sensor
#[derive(Debug, Clone, Copy)]
pub struct UvSensor;

impl Sensor for UvSensor {
    type Reading = Uv;

    const KIND: DriverKind = DriverKind::Uv;

    fn configuration() -> DriverConfig {
        DriverConfig::with_timing(2.0, 6.0)
    }

    fn decode(codec: &dyn MessageCodec, payload: &[u8]) -> Result<Uv> {
        codec.decode_uv(payload)
    }
}

/// Driver behavior of the ultraviolet sensor
pub type UvDriver = SensorDriver<UvSensor>;
