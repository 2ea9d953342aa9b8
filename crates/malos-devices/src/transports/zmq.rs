/*!
 * ZeroMQ transport.
 *
 * The MALOS daemon binds a PULL socket on the config and keep-alive ports of
 * each driver and a PUB socket on its error and data ports. This transport
 * connects the matching PUSH and SUB sockets.
 */
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use zeromq::{PushSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

use malos_core::error::{Error, Result};
use malos_core::types::Endpoint;

use crate::transport::{PushChannel, SubscribeChannel, Transport};

/// Transport using ZeroMQ sockets over TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqTransport;

impl ZmqTransport {
    /// Create a new ZeroMQ transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ZmqTransport {
    fn name(&self) -> &'static str {
        "zmq"
    }

    async fn connect_push(&self, endpoint: &Endpoint) -> Result<Box<dyn PushChannel>> {
        let mut socket = PushSocket::new();
        socket
            .connect(endpoint.as_str())
            .await
            .map_err(|e| Error::channel_open(endpoint, e))?;
        debug!("Connected PUSH socket to {}", endpoint);

        Ok(Box::new(ZmqPush {
            endpoint: endpoint.clone(),
            socket,
        }))
    }

    async fn connect_subscribe(&self, endpoint: &Endpoint) -> Result<Box<dyn SubscribeChannel>> {
        let mut socket = SubSocket::new();
        socket
            .connect(endpoint.as_str())
            .await
            .map_err(|e| Error::channel_open(endpoint, e))?;
        socket
            .subscribe("")
            .await
            .map_err(|e| Error::channel_open(endpoint, e))?;
        debug!("Connected SUB socket to {}", endpoint);

        Ok(Box::new(ZmqSubscribe {
            endpoint: endpoint.clone(),
            socket,
        }))
    }
}

struct ZmqPush {
    endpoint: Endpoint,
    socket: PushSocket,
}

impl fmt::Debug for ZmqPush {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZmqPush")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl PushChannel for ZmqPush {
    async fn send(&mut self, payload: Bytes) -> Result<()> {
        self.socket
            .send(ZmqMessage::from(payload))
            .await
            .map_err(|e| Error::channel_send(&self.endpoint, e))
    }
}

struct ZmqSubscribe {
    endpoint: Endpoint,
    socket: SubSocket,
}

impl fmt::Debug for ZmqSubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZmqSubscribe")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl SubscribeChannel for ZmqSubscribe {
    async fn recv(&mut self) -> Result<Bytes> {
        let message = self
            .socket
            .recv()
            .await
            .map_err(|e| Error::channel_receive(&self.endpoint, e))?;

        Ok(single_frame(message, &self.endpoint))
    }
}

/// First frame of a message; MALOS publishes single-frame messages
fn single_frame(message: ZmqMessage, endpoint: &Endpoint) -> Bytes {
    let mut frames = message.into_vec().into_iter();
    let first = frames.next().unwrap_or_default();
    let extra = frames.count();
    if extra > 0 {
        debug!("Dropped {} extra frames of a message on {}", extra, endpoint);
    }
    first
}
