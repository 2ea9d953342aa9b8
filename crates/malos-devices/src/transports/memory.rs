/*!
 * In-process transport.
 *
 * Endpoints are keyed by URL. Every payload pushed to an endpoint is recorded
 * so it can be inspected later, and callers can publish payloads to the
 * subscribers of an endpoint as if a driver had sent them.
 */
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use malos_core::error::{Error, Result};
use malos_core::types::Endpoint;

use crate::transport::{PushChannel, SubscribeChannel, Transport};

/// Messages buffered per endpoint before slow subscribers start lagging
const TOPIC_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct MemoryState {
    /// Pushed payloads in send order, across all endpoints
    history: Vec<(Endpoint, Bytes)>,
    /// Publishers of subscribed endpoints
    topics: HashMap<Endpoint, broadcast::Sender<Bytes>>,
    /// Endpoints that refuse connections
    failing: HashSet<Endpoint>,
}

/// Transport keeping every channel inside the process
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Create a new memory transport
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Payloads pushed to an endpoint, in send order
    pub fn sent(&self, endpoint: &Endpoint) -> Vec<Bytes> {
        self.state()
            .history
            .iter()
            .filter(|(to, _)| to == endpoint)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Every pushed payload with its endpoint, in send order
    pub fn history(&self) -> Vec<(Endpoint, Bytes)> {
        self.state().history.clone()
    }

    /// Publish a payload to the current subscribers of an endpoint
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, endpoint: &Endpoint, payload: impl Into<Bytes>) -> usize {
        let state = self.state();
        match state.topics.get(endpoint) {
            Some(sender) => sender.send(payload.into()).unwrap_or(0),
            None => 0,
        }
    }

    /// Number of open subscribe channels on an endpoint
    pub fn subscriber_count(&self, endpoint: &Endpoint) -> usize {
        self.state()
            .topics
            .get(endpoint)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Make every later connection to an endpoint fail
    pub fn fail_endpoint(&self, endpoint: &Endpoint) {
        self.state().failing.insert(endpoint.clone());
    }

    /// Close an endpoint; its subscribers get a receive error
    pub fn close(&self, endpoint: &Endpoint) {
        self.state().topics.remove(endpoint);
    }

    fn check_reachable(&self, endpoint: &Endpoint) -> Result<()> {
        if self.state().failing.contains(endpoint) {
            return Err(Error::channel_open(endpoint, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect_push(&self, endpoint: &Endpoint) -> Result<Box<dyn PushChannel>> {
        self.check_reachable(endpoint)?;
        debug!("Opened in-process push channel to {}", endpoint);

        Ok(Box::new(MemoryPush {
            endpoint: endpoint.clone(),
            transport: self.clone(),
        }))
    }

    async fn connect_subscribe(&self, endpoint: &Endpoint) -> Result<Box<dyn SubscribeChannel>> {
        self.check_reachable(endpoint)?;

        let receiver = self
            .state()
            .topics
            .entry(endpoint.clone())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        debug!("Opened in-process subscribe channel to {}", endpoint);

        Ok(Box::new(MemorySubscribe {
            endpoint: endpoint.clone(),
            receiver,
        }))
    }
}

#[derive(Debug)]
struct MemoryPush {
    endpoint: Endpoint,
    transport: MemoryTransport,
}

#[async_trait]
impl PushChannel for MemoryPush {
    async fn send(&mut self, payload: Bytes) -> Result<()> {
        self.transport
            .state()
            .history
            .push((self.endpoint.clone(), payload));
        Ok(())
    }
}

#[derive(Debug)]
struct MemorySubscribe {
    endpoint: Endpoint,
    receiver: broadcast::Receiver<Bytes>,
}

#[async_trait]
impl SubscribeChannel for MemorySubscribe {
    async fn recv(&mut self) -> Result<Bytes> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Ok(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber on {} dropped {} messages", self.endpoint, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::channel_receive(&self.endpoint, "endpoint closed"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::tcp("127.0.0.1", port)
    }

    #[tokio::test]
    async fn test_push_is_recorded() {
        let transport = MemoryTransport::new();
        let mut push = transport.connect_push(&endpoint(40001)).await.unwrap();

        push.send(Bytes::from_static(b"first")).await.unwrap();
        push.send(Bytes::new()).await.unwrap();

        assert_eq!(
            transport.sent(&endpoint(40001)),
            vec![Bytes::from_static(b"first"), Bytes::new()]
        );
        assert!(transport.sent(&endpoint(40002)).is_empty());
        assert_eq!(transport.history().len(), 2);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let transport = MemoryTransport::new();
        assert_eq!(transport.publish(&endpoint(40004), "lost"), 0);

        let mut sub = transport.connect_subscribe(&endpoint(40004)).await.unwrap();
        assert_eq!(transport.subscriber_count(&endpoint(40004)), 1);
        assert_eq!(transport.publish(&endpoint(40004), "hello"), 1);

        assert_eq!(sub.recv().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_failing_endpoint() {
        let transport = MemoryTransport::new();
        transport.fail_endpoint(&endpoint(40003));

        let err = transport.connect_subscribe(&endpoint(40003)).await.unwrap_err();
        assert!(matches!(err, Error::ChannelOpen { .. }));
        assert!(transport.connect_push(&endpoint(40001)).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_ends_subscription() {
        let transport = MemoryTransport::new();
        let mut sub = transport.connect_subscribe(&endpoint(40003)).await.unwrap();

        transport.close(&endpoint(40003));
        let err = sub.recv().await.unwrap_err();
        assert!(matches!(err, Error::ChannelReceive { .. }));
    }
}
