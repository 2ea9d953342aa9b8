/*!
 * Transport definitions for the MALOS client.
 *
 * A transport opens the two kinds of channels a driver exposes: push
 * channels the client writes to and subscribe channels it reads from.
 */
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use malos_core::error::Result;
use malos_core::types::Endpoint;

/// Write half of a channel
#[async_trait]
pub trait PushChannel: Send + Debug {
    /// Send one message without waiting for any acknowledgment
    async fn send(&mut self, payload: Bytes) -> Result<()>;
}

/// Read half of a channel
#[async_trait]
pub trait SubscribeChannel: Send + Debug {
    /// Wait for the next message
    ///
    /// An error means the channel is unusable.
    async fn recv(&mut self) -> Result<Bytes>;
}

/// Transport trait for opening driver channels
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Get the transport name
    fn name(&self) -> &'static str;

    /// Open a push channel to an endpoint
    async fn connect_push(&self, endpoint: &Endpoint) -> Result<Box<dyn PushChannel>>;

    /// Open a subscribe channel to an endpoint, subscribed to every message
    async fn connect_subscribe(&self, endpoint: &Endpoint) -> Result<Box<dyn SubscribeChannel>>;
}

/// A transport shared by every driver of a client
pub type SharedTransport = Arc<dyn Transport>;
