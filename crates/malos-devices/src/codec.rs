/*!
 * Message codec.
 *
 * Channels carry opaque bytes; a codec turns them into the message shapes in
 * [`crate::messages`] and back.
 */
use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use malos_core::error::{Error, Result};

use crate::messages::{DriverConfig, Humidity, Uv, ZigBeeMsg};

/// Encoding and decoding of MALOS messages
pub trait MessageCodec: Send + Sync + Debug {
    /// Get the codec name
    fn name(&self) -> &'static str;

    /// Encode a configuration or command for a config channel
    fn encode_config(&self, config: &DriverConfig) -> Result<Bytes>;

    /// Decode a configuration
    fn decode_config(&self, bytes: &[u8]) -> Result<DriverConfig>;

    /// Encode a ZigBee message the way the gateway publishes it
    fn encode_zigbee(&self, message: &ZigBeeMsg) -> Result<Bytes>;

    /// Decode a ZigBee gateway notification
    fn decode_zigbee(&self, bytes: &[u8]) -> Result<ZigBeeMsg>;

    /// Decode a humidity reading
    fn decode_humidity(&self, bytes: &[u8]) -> Result<Humidity>;

    /// Decode an ultraviolet reading
    fn decode_uv(&self, bytes: &[u8]) -> Result<Uv>;
}

/// A codec shared between drivers
pub type SharedCodec = Arc<dyn MessageCodec>;

/// JSON codec backed by serde_json
///
/// Understood by the in-process simulator and JSON-speaking test peers. A
/// stock MALOS daemon exchanges protobuf frames and does not decode it.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec
    pub fn new() -> Self {
        Self
    }

    /// Create a shared JSON codec
    pub fn shared() -> SharedCodec {
        Arc::new(Self)
    }

    fn notification<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::malformed(format!("Invalid {} notification: {}", what, e)))
    }
}

impl MessageCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode_config(&self, config: &DriverConfig) -> Result<Bytes> {
        serde_json::to_vec(config)
            .map(Bytes::from)
            .map_err(|e| Error::codec(format!("Failed to encode driver config: {}", e)))
    }

    fn decode_config(&self, bytes: &[u8]) -> Result<DriverConfig> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::codec(format!("Failed to decode driver config: {}", e)))
    }

    fn encode_zigbee(&self, message: &ZigBeeMsg) -> Result<Bytes> {
        serde_json::to_vec(message)
            .map(Bytes::from)
            .map_err(|e| Error::codec(format!("Failed to encode ZigBee message: {}", e)))
    }

    fn decode_zigbee(&self, bytes: &[u8]) -> Result<ZigBeeMsg> {
        Self::notification("ZigBee", bytes)
    }

    fn decode_humidity(&self, bytes: &[u8]) -> Result<Humidity> {
        Self::notification("humidity", bytes)
    }

    fn decode_uv(&self, bytes: &[u8]) -> Result<Uv> {
        Self::notification("UV", bytes)
    }
}
