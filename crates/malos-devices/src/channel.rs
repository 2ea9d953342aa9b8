/*!
 * Channel lifecycle management.
 *
 * For each driver the manager opens the config channel and pushes the initial
 * configuration, then runs up to three background lanes:
 *
 * - keep-alive: an empty message every interval on `base_port + 1`
 * - error: every message on `base_port + 2` goes to the error handler
 * - data: every message on `base_port + 3` goes to the data handler
 *
 * Lanes are independent tasks. A lane whose channel fails stops and is
 * logged; the other lanes and drivers keep running. Every lane stops when the
 * shutdown token is cancelled.
 */
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use malos_core::error::Result;
use malos_core::logging::{driver_span, lane_span};
use malos_core::types::{ChannelRole, DriverDescriptor};
use malos_core::utils::spawn_and_log;

use crate::codec::SharedCodec;
use crate::driver::{ConfigPusher, DriverBehavior, SharedDriver};
use crate::transport::{PushChannel, SharedTransport, SubscribeChannel};

/// Opens driver channels and runs their lanes
#[derive(Debug, Clone)]
pub struct ChannelManager {
    transport: SharedTransport,
    codec: SharedCodec,
    keep_alive_interval: Duration,
    shutdown: CancellationToken,
}

impl ChannelManager {
    /// Create a new channel manager
    pub fn new(
        transport: SharedTransport,
        codec: SharedCodec,
        keep_alive_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            codec,
            keep_alive_interval,
            shutdown,
        }
    }

    /// The token that stops every lane
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Open the config channel of a driver
    pub async fn open_config_channel(&self, descriptor: &DriverDescriptor) -> Result<ConfigPusher> {
        let endpoint = descriptor.address.endpoint(ChannelRole::Config)?;
        let channel = self.transport.connect_push(&endpoint).await?;
        debug!("Config channel of {} open at {}", descriptor.name, endpoint);

        Ok(ConfigPusher::new(endpoint, self.codec.clone(), channel))
    }

    /// Push a driver's initial configuration
    pub async fn push_initial_configuration(
        &self,
        behavior: &dyn DriverBehavior,
        pusher: &ConfigPusher,
    ) -> Result<()> {
        pusher.push(&behavior.initial_configuration()).await?;
        info!("Initial configuration pushed to {}", pusher.endpoint());
        Ok(())
    }

    /// Open a driver's background channels and start their lanes
    ///
    /// A channel that fails to open is logged and its lane is not started.
    pub async fn spawn_lanes(
        &self,
        descriptor: &DriverDescriptor,
        behavior: SharedDriver,
    ) -> DriverLanes {
        let mut lanes = DriverLanes::new(&descriptor.name);

        if behavior.needs_keep_alive() {
            if let Some(channel) = self.open_push(descriptor, ChannelRole::KeepAlive).await {
                let task = keep_alive_lane(channel, self.keep_alive_interval, self.shutdown.clone());
                lanes.push(descriptor, ChannelRole::KeepAlive, task);
            }
        }

        if let Some(channel) = self.open_subscribe(descriptor, ChannelRole::Error).await {
            let task = receive_lane(
                channel,
                behavior.clone(),
                ChannelRole::Error,
                self.shutdown.clone(),
            );
            lanes.push(descriptor, ChannelRole::Error, task);
        }

        if behavior.has_data_handler() {
            if let Some(channel) = self.open_subscribe(descriptor, ChannelRole::Data).await {
                let task = receive_lane(channel, behavior, ChannelRole::Data, self.shutdown.clone());
                lanes.push(descriptor, ChannelRole::Data, task);
            }
        }

        lanes
    }

    /// Open the config channel, push the initial configuration and start the
    /// lanes of one driver
    pub async fn start_driver(
        &self,
        descriptor: &DriverDescriptor,
        behavior: SharedDriver,
        pusher: &ConfigPusher,
    ) -> Result<DriverLanes> {
        self.push_initial_configuration(behavior.as_ref(), pusher)
            .instrument(driver_span(descriptor))
            .await?;
        Ok(self.spawn_lanes(descriptor, behavior).await)
    }

    async fn open_push(
        &self,
        descriptor: &DriverDescriptor,
        role: ChannelRole,
    ) -> Option<Box<dyn PushChannel>> {
        let opened = match descriptor.address.endpoint(role) {
            Ok(endpoint) => self.transport.connect_push(&endpoint).await,
            Err(e) => Err(e),
        };
        opened
            .map_err(|e| error!("{} channel of {} not started: {}", role, descriptor.name, e))
            .ok()
    }

    async fn open_subscribe(
        &self,
        descriptor: &DriverDescriptor,
        role: ChannelRole,
    ) -> Option<Box<dyn SubscribeChannel>> {
        let opened = match descriptor.address.endpoint(role) {
            Ok(endpoint) => self.transport.connect_subscribe(&endpoint).await,
            Err(e) => Err(e),
        };
        opened
            .map_err(|e| error!("{} channel of {} not started: {}", role, descriptor.name, e))
            .ok()
    }
}

async fn keep_alive_lane(
    mut channel: Box<dyn PushChannel>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = channel.send(Bytes::new()).await {
                    warn!("Keep-alive not sent: {}", e);
                }
            }
        }
    }

    debug!("Keep-alive lane stopped");
    Ok(())
}

async fn receive_lane(
    mut channel: Box<dyn SubscribeChannel>,
    behavior: SharedDriver,
    role: ChannelRole,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let payload = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = channel.recv() => received?,
        };

        let handled = tokio::select! {
            _ = shutdown.cancelled() => break,
            handled = dispatch(behavior.as_ref(), role, payload) => handled,
        };
        match handled {
            Ok(()) => {}
            Err(e) if e.is_per_message() => warn!("Dropped {} message: {}", role, e),
            Err(e) => error!("{} handler failed: {}", role, e),
        }
    }

    debug!("{} lane stopped", role);
    Ok(())
}

async fn dispatch(behavior: &dyn DriverBehavior, role: ChannelRole, payload: Bytes) -> Result<()> {
    match role {
        ChannelRole::Data => behavior.on_data(payload).await,
        _ => behavior.on_error(payload).await,
    }
}

/// Handles of the running lanes of one driver
#[derive(Debug)]
pub struct DriverLanes {
    driver: String,
    tasks: Vec<(ChannelRole, JoinHandle<()>)>,
}

impl DriverLanes {
    fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            tasks: Vec::new(),
        }
    }

    fn push<F>(&mut self, descriptor: &DriverDescriptor, role: ChannelRole, lane: F)
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let name = format!("{}/{}", descriptor.name, role);
        let handle = spawn_and_log(&name, lane_span(descriptor, role), lane);
        self.tasks.push((role, handle));
    }

    /// Name of the driver the lanes belong to
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Roles of the lanes that were started
    pub fn roles(&self) -> Vec<ChannelRole> {
        self.tasks.iter().map(|(role, _)| *role).collect()
    }

    /// Whether the lane with the given role is still running
    pub fn is_running(&self, role: ChannelRole) -> bool {
        self.tasks
            .iter()
            .any(|(r, handle)| *r == role && !handle.is_finished())
    }

    /// Wait for every lane to stop
    pub async fn join(self) {
        let stopped = join_all(
            self.tasks
                .into_iter()
                .map(|(role, handle)| async move { (role, handle.await) }),
        )
        .await;

        for (role, result) in stopped {
            if let Err(e) = result {
                warn!("{} lane of {} panicked: {}", role, self.driver, e);
            }
        }
    }
}
