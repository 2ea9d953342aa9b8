/*!
 * ZigBee gateway driver.
 *
 * Gateway notifications arrive on the driver's data lane and are fed to the
 * state machine in arrival order. The machine, the pending re-check and
 * operator requests are serialized through one async mutex, so the resulting
 * commands leave on the config channel in the order they were decided. A new
 * state is published once its commands were sent.
 */
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Span};

use malos_core::error::{Error, Result};
use malos_core::types::DriverKind;
use malos_core::utils::{sleep_unless_cancelled, spawn_and_log, with_timeout};
use malos_devices::codec::SharedCodec;
use malos_devices::driver::{ConfigPusher, DriverBehavior, DriverContext};
use malos_devices::messages::DriverConfig;

use crate::directory::DeviceDirectory;
use crate::machine::{GatewayAction, GatewayCommand, GatewayStateMachine};
use crate::state::GatewayState;

/// Seconds between two gateway updates
const DELAY_BETWEEN_UPDATES: f32 = 1.0;

/// Seconds the gateway keeps publishing without keep-alives
const TIMEOUT_AFTER_LAST_PING: f32 = 1.0;

/// Driver behavior of the ZigBee gateway
///
/// Clones share the same gateway state and directory.
#[derive(Debug, Clone)]
pub struct ZigbeeDriver {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: String,
    pusher: ConfigPusher,
    codec: SharedCodec,
    machine: Mutex<GatewayStateMachine>,
    directory: DeviceDirectory,
    state: watch::Sender<GatewayState>,
    shutdown: CancellationToken,
}

impl ZigbeeDriver {
    /// Create a gateway driver in the `Idle` state
    pub fn new(ctx: DriverContext) -> Self {
        let (state, _) = watch::channel(GatewayState::Idle);
        Self {
            inner: Arc::new(Inner {
                name: ctx.descriptor.name,
                pusher: ctx.pusher,
                codec: ctx.codec,
                machine: Mutex::new(GatewayStateMachine::new(&ctx.timing)),
                directory: DeviceDirectory::new(),
                state,
                shutdown: ctx.shutdown,
            }),
        }
    }

    /// Current gateway state
    pub fn state(&self) -> GatewayState {
        *self.inner.state.borrow()
    }

    /// Watch gateway state changes
    pub fn subscribe_state(&self) -> watch::Receiver<GatewayState> {
        self.inner.state.subscribe()
    }

    /// Wait until the gateway reaches `target`
    pub async fn wait_for_state(&self, target: GatewayState, timeout: Duration) -> Result<()> {
        let mut states = self.subscribe_state();
        with_timeout(timeout, async move {
            states
                .wait_for(|state| *state == target)
                .await
                .map(|_| ())
                .map_err(|_| Error::runtime("Gateway state channel closed"))
        })
        .await
    }

    /// Devices discovered so far
    pub fn directory(&self) -> &DeviceDirectory {
        &self.inner.directory
    }

    /// Ask the gateway whether its proxy is running
    pub async fn check_gateway_active(&self) -> Result<()> {
        info!("Checking connection with the gateway");
        self.inner
            .run(|machine| machine.check_gateway_active())
            .await
    }

    /// Ask the gateway for its network status
    pub async fn request_network_status(&self) -> Result<()> {
        info!("Requesting network status");
        self.inner
            .run(|machine| machine.request_network_status())
            .await
    }

    /// Open a join window for new devices
    pub async fn permit_join(&self) -> Result<()> {
        self.inner.run(|machine| machine.permit_join()).await
    }
}

impl Inner {
    async fn run<F>(self: &Arc<Self>, decide: F) -> Result<()>
    where
        F: FnOnce(&mut GatewayStateMachine) -> Vec<GatewayAction>,
    {
        let mut machine = self.machine.lock().await;
        let actions = decide(&mut machine);
        let applied = self.apply(actions).await;
        self.state.send_replace(machine.state());
        applied
    }

    /// Carry out every action, even after a failed send, and return the first
    /// send error
    ///
    /// A reset that could not be sent still gets its re-check, so the machine
    /// never stays in `ResettingGateway` without a timer pending.
    async fn apply(self: &Arc<Self>, actions: Vec<GatewayAction>) -> Result<()> {
        let mut first_error = None;
        for action in actions {
            match action {
                GatewayAction::Send(command) => {
                    if let Err(e) = self.send(command).await {
                        error!("Gateway command not sent: {}", e);
                        first_error.get_or_insert(e);
                    }
                }
                GatewayAction::ScheduleRecheck(delay) => self.schedule_recheck(delay),
                GatewayAction::ImportDevices(pairs) => {
                    let added = self.directory.import(&pairs, &self.pusher);
                    debug!("{} of {} devices were new", added, pairs.len());
                }
                GatewayAction::ReportUnresponsive { attempts } => {
                    error!("{}", Error::GatewayUnresponsive { attempts });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn send(&self, command: GatewayCommand) -> Result<()> {
        info!("Sending {} to gateway", command);
        self.pusher.push(&command.to_config()).await
    }

    fn schedule_recheck(self: &Arc<Self>, delay: Duration) {
        let inner = Arc::clone(self);
        let name = format!("{}/recheck", self.name);
        spawn_and_log(&name, Span::current(), async move {
            if !sleep_unless_cancelled(delay, &inner.shutdown).await {
                return Ok(());
            }

            let mut machine = inner.machine.lock().await;
            let sent = match machine.on_recheck() {
                Some(command) => inner.send(command).await,
                None => Ok(()),
            };
            inner.state.send_replace(machine.state());
            sent
        });
    }
}

#[async_trait]
impl DriverBehavior for ZigbeeDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Zigbee
    }

    fn initial_configuration(&self) -> DriverConfig {
        DriverConfig::with_timing(DELAY_BETWEEN_UPDATES, TIMEOUT_AFTER_LAST_PING)
    }

    fn needs_keep_alive(&self) -> bool {
        true
    }

    fn has_data_handler(&self) -> bool {
        true
    }

    async fn on_data(&self, payload: Bytes) -> Result<()> {
        let message = self.inner.codec.decode_zigbee(&payload)?;
        debug!("Gateway message: {:?}", message);

        let mut machine = self.inner.machine.lock().await;
        let actions = machine.handle(&message)?;
        let applied = self.inner.apply(actions).await;
        self.inner.state.send_replace(machine.state());
        applied
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use malos_core::config::TimingConfig;
    use malos_core::types::{DriverAddress, DriverDescriptor, Endpoint};
    use malos_devices::codec::{JsonCodec, MessageCodec};
    use malos_devices::messages::{
        Cluster, ConnectedNode, NetworkMgmtCmd, NetworkMgmtCmdType, NetworkStatus,
        NetworkStatusType, NodeEndpoint, ZigBeeCmdType, ZigBeeMsg,
    };
    use malos_devices::transport::{PushChannel, Transport};
    use malos_devices::transports::MemoryTransport;

    use super::*;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl PushChannel for Unreachable {
        async fn send(&mut self, _payload: Bytes) -> Result<()> {
            Err(Error::channel_send("tcp://127.0.0.1:40001", "host unreachable"))
        }
    }

    struct Harness {
        driver: ZigbeeDriver,
        transport: MemoryTransport,
        endpoint: Endpoint,
        shutdown: CancellationToken,
    }

    impl Harness {
        async fn new() -> Self {
            let transport = MemoryTransport::new();
            let address = DriverAddress::new("127.0.0.1", 40001);
            let endpoint = Endpoint::tcp("127.0.0.1", 40001);
            let channel = transport.connect_push(&endpoint).await.unwrap();
            let shutdown = CancellationToken::new();
            let driver = ZigbeeDriver::new(DriverContext {
                descriptor: DriverDescriptor::new("zigbee", address),
                pusher: ConfigPusher::new(endpoint.clone(), JsonCodec::shared(), channel),
                codec: JsonCodec::shared(),
                timing: TimingConfig::default(),
                shutdown: shutdown.clone(),
            });
            Self {
                driver,
                transport,
                endpoint,
                shutdown,
            }
        }

        async fn receive(&self, message: ZigBeeMsg) -> Result<()> {
            let payload = JsonCodec.encode_zigbee(&message).unwrap();
            self.driver.on_data(payload).await
        }

        fn commands(&self) -> Vec<NetworkMgmtCmdType> {
            self.transport
                .sent(&self.endpoint)
                .iter()
                .map(|payload| {
                    JsonCodec
                        .decode_config(payload)
                        .unwrap()
                        .zigbee_message
                        .and_then(|message| message.network_mgmt_cmd)
                        .map(|cmd| cmd.kind)
                        .unwrap_or_default()
                })
                .collect()
        }
    }

    fn proxy_active(active: bool) -> ZigBeeMsg {
        let mut cmd = NetworkMgmtCmd::new(NetworkMgmtCmdType::IsProxyActive);
        cmd.is_proxy_active = active;
        ZigBeeMsg::network_mgmt(cmd)
    }

    fn no_network() -> ZigBeeMsg {
        let mut cmd = NetworkMgmtCmd::new(NetworkMgmtCmdType::NetworkStatus);
        cmd.network_status = Some(NetworkStatus {
            kind: NetworkStatusType::NoNetwork,
        });
        ZigBeeMsg::network_mgmt(cmd)
    }

    fn discovery(pairs: &[(u32, u32)]) -> ZigBeeMsg {
        let mut cmd = NetworkMgmtCmd::new(NetworkMgmtCmdType::DiscoveryInfo);
        cmd.connected_nodes = pairs
            .iter()
            .map(|&(node_id, endpoint_index)| ConnectedNode {
                node_id,
                endpoints: vec![NodeEndpoint {
                    endpoint_index,
                    clusters: vec![Cluster { cluster_id: 6 }],
                }],
            })
            .collect();
        ZigBeeMsg::network_mgmt(cmd)
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_gateway_scenario() {
        let harness = Harness::new().await;
        assert_eq!(harness.driver.state(), GatewayState::Idle);

        harness.receive(proxy_active(false)).await.unwrap();
        assert_eq!(harness.commands(), vec![NetworkMgmtCmdType::ResetProxy]);
        assert_eq!(harness.driver.state(), GatewayState::ResettingGateway);

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(harness.commands().len(), 1);

        harness
            .driver
            .wait_for_state(GatewayState::AwaitingGatewayActive, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            harness.commands(),
            vec![NetworkMgmtCmdType::ResetProxy, NetworkMgmtCmdType::IsProxyActive]
        );

        harness.receive(proxy_active(true)).await.unwrap();
        assert_eq!(harness.driver.state(), GatewayState::AwaitingNetworkStatus);
        assert_eq!(harness.commands().len(), 2);

        harness.receive(no_network()).await.unwrap();
        assert_eq!(harness.commands()[2], NetworkMgmtCmdType::CreateNwk);
        assert_eq!(harness.driver.state(), GatewayState::AwaitingNetworkStatus);

        harness.receive(discovery(&[(7, 1), (9, 3)])).await.unwrap();
        assert_eq!(harness.driver.directory().len(), 2);
        assert_eq!(harness.driver.state(), GatewayState::DevicesDiscovered);
        assert_eq!(harness.commands().len(), 3);
    }

    #[tokio::test]
    async fn test_discovery_idempotence() {
        let harness = Harness::new().await;

        harness.receive(discovery(&[(7, 1), (9, 3)])).await.unwrap();
        harness.receive(discovery(&[(9, 3), (7, 1)])).await.unwrap();

        let devices = harness.driver.directory().devices();
        let pairs: Vec<_> = devices
            .iter()
            .map(|device| (device.node_id(), device.endpoint_index()))
            .collect();
        assert_eq!(pairs, vec![(7, 1), (9, 3)]);
        assert!(harness.transport.sent(&harness.endpoint).is_empty());
    }

    #[tokio::test]
    async fn test_discovered_device_commands_use_gateway_channel() {
        let harness = Harness::new().await;
        harness.receive(discovery(&[(7, 1)])).await.unwrap();

        let device = harness.driver.directory().get(7, 1).unwrap();
        device.toggle().await.unwrap();

        let sent = harness.transport.sent(&harness.endpoint);
        assert_eq!(sent.len(), 1);
        let message = JsonCodec.decode_config(&sent[0]).unwrap().zigbee_message.unwrap();
        assert_eq!(message.kind, ZigBeeCmdType::Zcl);
        let zcl = message.zcl_cmd.unwrap();
        assert_eq!((zcl.node_id, zcl.endpoint_index), (7, 1));
    }

    #[tokio::test]
    async fn test_unmodeled_notification() {
        let harness = Harness::new().await;
        let message = ZigBeeMsg {
            kind: ZigBeeCmdType::Unknown,
            ..Default::default()
        };

        let err = harness.receive(message).await.unwrap_err();
        assert!(matches!(err, Error::MalformedNotification(_)));

        let err = harness
            .driver
            .on_data(Bytes::from_static(b"\x00\xff"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedNotification(_)));

        assert_eq!(harness.driver.state(), GatewayState::Idle);
        assert!(harness.driver.directory().is_empty());
        assert!(harness.transport.sent(&harness.endpoint).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_recheck() {
        let harness = Harness::new().await;
        harness.receive(proxy_active(false)).await.unwrap();

        harness.shutdown.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(harness.commands(), vec![NetworkMgmtCmdType::ResetProxy]);
        assert_eq!(harness.driver.state(), GatewayState::ResettingGateway);
    }

    #[tokio::test]
    async fn test_operator_actions() {
        let harness = Harness::new().await;

        harness.driver.check_gateway_active().await.unwrap();
        harness.driver.request_network_status().await.unwrap();
        harness.driver.permit_join().await.unwrap();

        assert_eq!(
            harness.commands(),
            vec![
                NetworkMgmtCmdType::IsProxyActive,
                NetworkMgmtCmdType::NetworkStatus,
                NetworkMgmtCmdType::PermitJoin,
            ]
        );
        assert_eq!(
            harness.driver.state(),
            GatewayState::AwaitingDeviceDiscovery
        );
    }

    #[tokio::test]
    async fn test_instances_do_not_share_state() {
        let first = Harness::new().await;
        let second = Harness::new().await;

        first.receive(proxy_active(true)).await.unwrap();
        assert_eq!(first.driver.state(), GatewayState::AwaitingNetworkStatus);
        assert_eq!(second.driver.state(), GatewayState::Idle);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_unsent_reset_still_rechecks() {
        let endpoint = Endpoint::tcp("127.0.0.1", 40001);
        let driver = ZigbeeDriver::new(DriverContext {
            descriptor: DriverDescriptor::new("zigbee", DriverAddress::new("127.0.0.1", 40001)),
            pusher: ConfigPusher::new(endpoint, JsonCodec::shared(), Box::new(Unreachable)),
            codec: JsonCodec::shared(),
            timing: TimingConfig::default(),
            shutdown: CancellationToken::new(),
        });
        let receive = |message: ZigBeeMsg| {
            let driver = driver.clone();
            async move {
                let payload = JsonCodec.encode_zigbee(&message).unwrap();
                driver.on_data(payload).await
            }
        };

        let err = receive(proxy_active(false)).await.unwrap_err();
        assert!(matches!(err, Error::ChannelSend { .. }));
        assert_eq!(driver.state(), GatewayState::ResettingGateway);

        driver
            .wait_for_state(GatewayState::AwaitingGatewayActive, Duration::from_secs(5))
            .await
            .unwrap();

        receive(proxy_active(true)).await.unwrap();
        assert_eq!(driver.state(), GatewayState::AwaitingNetworkStatus);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsent_resets_end_unresponsive() {
        let endpoint = Endpoint::tcp("127.0.0.1", 40001);
        let driver = ZigbeeDriver::new(DriverContext {
            descriptor: DriverDescriptor::new("zigbee", DriverAddress::new("127.0.0.1", 40001)),
            pusher: ConfigPusher::new(endpoint, JsonCodec::shared(), Box::new(Unreachable)),
            codec: JsonCodec::shared(),
            timing: TimingConfig::default(),
            shutdown: CancellationToken::new(),
        });
        let inactive = JsonCodec.encode_zigbee(&proxy_active(false)).unwrap();

        let attempts = TimingConfig::default().gateway_max_reset_attempts;
        for _ in 0..attempts {
            assert!(driver.on_data(inactive.clone()).await.is_err());
            driver
                .wait_for_state(GatewayState::AwaitingGatewayActive, Duration::from_secs(5))
                .await
                .unwrap();
        }

        driver.on_data(inactive).await.unwrap();
        assert_eq!(driver.state(), GatewayState::Idle);
    }
}
