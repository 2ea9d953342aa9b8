/*!
 * Client orchestration.
 *
 * Startup runs in two phases. First every declared driver is resolved, its
 * config channel opened and its initial configuration pushed. Only then are
 * the background lanes of the drivers that made it through started. A driver
 * failing either phase is logged and recorded; the others keep going.
 */
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use malos_core::config::{Config, SharedConfig, TimingConfig, TransportKind};
use malos_core::error::{Error, Result};
use malos_core::logging::driver_span;
use malos_core::types::DriverDescriptor;
use malos_devices::channel::{ChannelManager, DriverLanes};
use malos_devices::codec::{JsonCodec, SharedCodec};
use malos_devices::driver::{DriverBehavior, DriverContext, SharedDriver};
use malos_devices::transport::SharedTransport;
use malos_devices::transports::MemoryTransport;
use malos_zigbee::ZigbeeDriver;

use crate::registry::DriverRegistry;

/// A driver whose lanes were started
#[derive(Debug)]
pub struct RunningDriver {
    descriptor: DriverDescriptor,
    behavior: SharedDriver,
    lanes: DriverLanes,
}

impl RunningDriver {
    /// Name and address of the driver
    pub fn descriptor(&self) -> &DriverDescriptor {
        &self.descriptor
    }

    /// The driver's behavior
    pub fn behavior(&self) -> &SharedDriver {
        &self.behavior
    }

    /// The driver's lanes
    pub fn lanes(&self) -> &DriverLanes {
        &self.lanes
    }
}

/// A declared driver that could not be started
#[derive(Debug)]
pub struct FailedDriver {
    /// Name and address of the driver
    pub descriptor: DriverDescriptor,
    /// Why it was disabled
    pub error: Error,
}

/// Running MALOS client
#[derive(Debug)]
pub struct Client {
    config: SharedConfig,
    shutdown: CancellationToken,
    drivers: Vec<RunningDriver>,
    failed: Vec<FailedDriver>,
}

impl Client {
    /// Start every configured driver using the transport named by the
    /// configuration and the JSON codec
    pub async fn connect(config: Config) -> Result<Self> {
        let transport = transport_for(config.device.transport)?;
        Ok(Self::start(config, transport, JsonCodec::shared()).await)
    }

    /// Start every configured driver with the built-in registry
    pub async fn start(config: Config, transport: SharedTransport, codec: SharedCodec) -> Self {
        Self::start_with_registry(config, &DriverRegistry::builtin(), transport, codec).await
    }

    /// Start every configured driver with a custom registry
    pub async fn start_with_registry(
        config: Config,
        registry: &DriverRegistry,
        transport: SharedTransport,
        codec: SharedCodec,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let manager = ChannelManager::new(
            transport,
            codec.clone(),
            config.timing.keep_alive_interval(),
            shutdown.clone(),
        );

        let mut configured = Vec::new();
        let mut failed = Vec::new();

        for descriptor in config.descriptors() {
            let prepared = prepare_driver(&manager, registry, &descriptor, &codec, &config.timing)
                .instrument(driver_span(&descriptor))
                .await;

            match prepared {
                Ok(behavior) => configured.push((descriptor, behavior)),
                Err(e) => {
                    error!("Driver {} disabled: {}", descriptor, e);
                    failed.push(FailedDriver {
                        descriptor,
                        error: e,
                    });
                }
            }
        }

        let mut drivers = Vec::with_capacity(configured.len());
        for (descriptor, behavior) in configured {
            let lanes = manager.spawn_lanes(&descriptor, behavior.clone()).await;
            info!("Driver {} running with lanes {:?}", descriptor, lanes.roles());
            drivers.push(RunningDriver {
                descriptor,
                behavior,
                lanes,
            });
        }

        info!(
            running = drivers.len(),
            failed = failed.len(),
            "Client started"
        );

        Self {
            config: SharedConfig::new(config),
            shutdown,
            drivers,
            failed,
        }
    }

    /// The configuration the client was started with
    pub fn config(&self) -> &Config {
        self.config.get()
    }

    /// Drivers whose lanes were started, in declaration order
    pub fn drivers(&self) -> &[RunningDriver] {
        &self.drivers
    }

    /// Declared drivers that were disabled during startup
    pub fn failed_drivers(&self) -> &[FailedDriver] {
        &self.failed
    }

    /// Behavior of the first running driver with the given name
    pub fn behavior(&self, name: &str) -> Option<&SharedDriver> {
        self.drivers
            .iter()
            .find(|driver| driver.descriptor.name == name)
            .map(|driver| &driver.behavior)
    }

    /// Typed handle of the first running driver with the given name
    pub fn driver<T>(&self, name: &str) -> Option<T>
    where
        T: DriverBehavior + Clone + 'static,
    {
        self.behavior(name)
            .and_then(|behavior| behavior.as_any().downcast_ref::<T>())
            .cloned()
    }

    /// The first running ZigBee gateway
    pub fn gateway(&self) -> Option<ZigbeeDriver> {
        self.drivers
            .iter()
            .find_map(|driver| driver.behavior.as_any().downcast_ref::<ZigbeeDriver>())
            .cloned()
    }

    /// The token cancelled by [`Client::shutdown`]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Ask every lane and pending timer to stop
    pub fn shutdown(&self) {
        info!("Shutting down");
        self.shutdown.cancel();
    }

    /// Wait for every lane to stop
    pub async fn join(self) {
        join_all(self.drivers.into_iter().map(|driver| driver.lanes.join())).await;
        info!("All lanes stopped");
    }
}

async fn prepare_driver(
    manager: &ChannelManager,
    registry: &DriverRegistry,
    descriptor: &DriverDescriptor,
    codec: &SharedCodec,
    timing: &TimingConfig,
) -> Result<SharedDriver> {
    let factory = registry.resolve(descriptor)?;
    let pusher = manager.open_config_channel(descriptor).await?;

    let behavior = factory(DriverContext {
        descriptor: descriptor.clone(),
        pusher: pusher.clone(),
        codec: codec.clone(),
        timing: timing.clone(),
        shutdown: manager.shutdown_token().clone(),
    });
    manager
        .push_initial_configuration(behavior.as_ref(), &pusher)
        .await?;

    Ok(behavior)
}

/// Create the transport selected in the configuration
pub fn transport_for(kind: TransportKind) -> Result<SharedTransport> {
    match kind {
        TransportKind::Memory => Ok(Arc::new(MemoryTransport::new())),
        #[cfg(feature = "zmq")]
        TransportKind::Zmq => Ok(Arc::new(malos_devices::transports::ZmqTransport::new())),
        #[cfg(not(feature = "zmq"))]
        TransportKind::Zmq => Err(Error::config(
            "The zmq transport is not compiled in; enable the zmq feature",
        )),
    }
}
