/*!
 * Generic sensor driver.
 *
 * Sensors are configured once, kept alive and publish readings on their data
 * channel. The latest decoded reading is kept and published to watchers.
 */
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use tracing::info;

use malos_core::error::Result;
use malos_core::types::DriverKind;

use crate::codec::{MessageCodec, SharedCodec};
use crate::driver::{DriverBehavior, DriverContext};
use crate::messages::DriverConfig;

/// A kind of sensor driver
pub trait Sensor: Clone + Send + Sync + Debug + 'static {
    /// Decoded data message
    type Reading: Clone + Debug + Send + Sync + 'static;

    /// Driver kind of the sensor
    const KIND: DriverKind;

    /// Configuration pushed when the driver starts
    fn configuration() -> DriverConfig;

    /// Decode a data message
    fn decode(codec: &dyn MessageCodec, payload: &[u8]) -> Result<Self::Reading>;
}

/// Driver behavior for a sensor
#[derive(Debug, Clone)]
pub struct SensorDriver<S: Sensor> {
    name: String,
    codec: SharedCodec,
    readings: Arc<watch::Sender<Option<S::Reading>>>,
}

impl<S: Sensor> SensorDriver<S> {
    /// Create a new sensor driver
    pub fn new(ctx: DriverContext) -> Self {
        let (readings, _) = watch::channel(None);
        Self {
            name: ctx.descriptor.name,
            codec: ctx.codec,
            readings: Arc::new(readings),
        }
    }

    /// The most recent reading, if any arrived yet
    pub fn latest(&self) -> Option<S::Reading> {
        self.readings.borrow().clone()
    }

    /// Watch incoming readings
    pub fn subscribe(&self) -> watch::Receiver<Option<S::Reading>> {
        self.readings.subscribe()
    }
}

#[async_trait]
impl<S: Sensor> DriverBehavior for SensorDriver<S> {
    fn kind(&self) -> DriverKind {
        S::KIND
    }

    fn initial_configuration(&self) -> DriverConfig {
        S::configuration()
    }

    fn needs_keep_alive(&self) -> bool {
        true
    }

    fn has_data_handler(&self) -> bool {
        true
    }

    async fn on_data(&self, payload: Bytes) -> Result<()> {
        let reading = S::decode(self.codec.as_ref(), &payload)?;
        info!("{} data: {:?}", self.name, reading);
        self.readings.send_replace(Some(reading));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
