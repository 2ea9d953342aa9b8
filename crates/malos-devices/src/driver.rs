/*!
 * Driver behavior trait and the capabilities handed to drivers.
 *
 * A behavior describes one kind of MALOS driver: the configuration it needs,
 * whether it must be kept alive and how its notifications are handled. It owns
 * no channel; the channel manager feeds it.
 */
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use malos_core::config::TimingConfig;
use malos_core::error::Result;
use malos_core::types::{DriverDescriptor, DriverKind, Endpoint};

use crate::codec::SharedCodec;
use crate::messages::DriverConfig;
use crate::transport::PushChannel;

/// Behavior of one driver instance
#[async_trait]
pub trait DriverBehavior: Send + Sync + Debug {
    /// Get the driver kind
    fn kind(&self) -> DriverKind;

    /// Configuration pushed once when the driver starts
    fn initial_configuration(&self) -> DriverConfig;

    /// Whether the driver stops publishing without periodic keep-alives
    fn needs_keep_alive(&self) -> bool {
        false
    }

    /// Handle a message from the driver's error channel
    async fn on_error(&self, payload: Bytes) -> Result<()> {
        warn!("Driver error: {}", String::from_utf8_lossy(&payload));
        Ok(())
    }

    /// Whether the driver's data channel should be subscribed
    fn has_data_handler(&self) -> bool {
        false
    }

    /// Handle a message from the driver's data channel
    async fn on_data(&self, payload: Bytes) -> Result<()> {
        trace!("Ignoring {} bytes of data", payload.len());
        Ok(())
    }

    /// Access the concrete behavior
    fn as_any(&self) -> &dyn Any;
}

/// A driver behavior shared between its lanes and the client
pub type SharedDriver = Arc<dyn DriverBehavior>;

/// Write access to a driver's config channel
///
/// Clones share the channel; concurrent pushes are serialized.
#[derive(Debug, Clone)]
pub struct ConfigPusher {
    endpoint: Endpoint,
    codec: SharedCodec,
    channel: Arc<Mutex<Box<dyn PushChannel>>>,
}

impl ConfigPusher {
    /// Wrap an open push channel
    pub fn new(endpoint: Endpoint, codec: SharedCodec, channel: Box<dyn PushChannel>) -> Self {
        Self {
            endpoint,
            codec,
            channel: Arc::new(Mutex::new(channel)),
        }
    }

    /// Endpoint of the config channel
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Encode and send a configuration or command
    pub async fn push(&self, config: &DriverConfig) -> Result<()> {
        let payload = self.codec.encode_config(config)?;
        self.push_raw(payload).await
    }

    /// Send an already encoded payload
    pub async fn push_raw(&self, payload: Bytes) -> Result<()> {
        trace!("Pushing {} bytes to {}", payload.len(), self.endpoint);
        self.channel.lock().await.send(payload).await
    }
}

/// Everything a driver behavior is constructed with
#[derive(Debug, Clone)]
pub struct DriverContext {
    /// Name and address of the driver
    pub descriptor: DriverDescriptor,
    /// The driver's config channel
    pub pusher: ConfigPusher,
    /// Codec for the driver's messages
    pub codec: SharedCodec,
    /// Timing parameters
    pub timing: TimingConfig,
    /// Cancelled when the client shuts down
    pub shutdown: CancellationToken,
}
