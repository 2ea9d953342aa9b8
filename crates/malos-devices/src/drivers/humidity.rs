/*!
 * Humidity sensor driver.
 */
use malos_core::error::Result;
use malos_core::types::DriverKind;

use crate::codec::MessageCodec;
use crate::drivers::sensor::{Sensor, SensorDriver};
use crate::messages::{DriverConfig, Humidity, HumidityParams};

/// Seconds between two readings
const DELAY_BETWEEN_UPDATES: f32 = 2.0;

/// Seconds the sensor keeps publishing without keep-alives
const TIMEOUT_AFTER_LAST_PING: f32 = 6.0;

/// Ambient temperature the sensor is calibrated against
const CALIBRATION_TEMPERATURE: f32 = 23.0;

/// The humidity and temperature sensor
#[derive(Debug, Clone, Copy)]
pub struct HumiditySensor;

impl Sensor for HumiditySensor {
    type Reading = Humidity;

    const KIND: DriverKind = DriverKind::Humidity;

    fn configuration() -> DriverConfig {
        DriverConfig {
            humidity: Some(HumidityParams {
                current_temperature: CALIBRATION_TEMPERATURE,
            }),
            ..DriverConfig::with_timing(DELAY_BETWEEN_UPDATES, TIMEOUT_AFTER_LAST_PING)
        }
    }

    fn decode(codec: &dyn MessageCodec, payload: &[u8]) -> Result<Humidity> {
        codec.decode_humidity(payload)
    }
}

/// Driver behavior of the humidity sensor
pub type HumidityDriver = SensorDriver<HumiditySensor>;
