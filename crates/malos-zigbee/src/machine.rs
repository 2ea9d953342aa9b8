/*!
 * Gateway management state machine.
 *
 * The machine consumes decoded gateway notifications and operator requests
 * and answers with the actions to perform: commands to push, a re-check to
 * schedule, devices to import. It performs no I/O itself.
 *
 * Transitions:
 *
 * | State | Notification | Actions | Next |
 * |---|---|---|---|
 * | any | discovery-info, N on/off endpoints | import | `DevicesDiscovered` if N > 0, else `Idle` |
 * | `Idle`, `AwaitingGatewayActive` | is-proxy-active, true | | `AwaitingNetworkStatus` |
 * | `Idle`, `AwaitingGatewayActive` | is-proxy-active, false | reset-proxy, re-check | `ResettingGateway` |
 * | `ResettingGateway` | re-check | is-proxy-active | `AwaitingGatewayActive` |
 * | `AwaitingNetworkStatus` | network-status, no network | create-network | unchanged |
 * | `AwaitingNetworkStatus` | network-status, joined | import | `AwaitingDeviceDiscovery` |
 *
 * Resets are bounded: once `max_reset_attempts` resets went unanswered the
 * machine reports the gateway unresponsive and returns to `Idle`.
 */
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use malos_core::config::TimingConfig;
use malos_core::error::{Error, Result};
use malos_devices::messages::{
    DriverConfig, NetworkMgmtCmd, NetworkMgmtCmdType, NetworkStatusType, ZigBeeCmdType, ZigBeeMsg,
    ON_OFF_CLUSTER_ID,
};

use crate::state::GatewayState;

/// A command sent to the gateway on its config channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCommand {
    /// Restart the gateway proxy
    ResetProxy,
    /// Ask whether the gateway proxy is running
    IsProxyActive,
    /// Ask for the network status
    NetworkStatus,
    /// Create a network and open a join window
    CreateNetwork {
        /// Join window in seconds
        permit_join_secs: u32,
    },
    /// Open a join window on the existing network
    PermitJoin {
        /// Join window in seconds
        secs: u32,
    },
}

impl GatewayCommand {
    /// The network management message carrying this command
    pub fn to_message(&self) -> ZigBeeMsg {
        let cmd = match *self {
            GatewayCommand::ResetProxy => NetworkMgmtCmd::new(NetworkMgmtCmdType::ResetProxy),
            GatewayCommand::IsProxyActive => NetworkMgmtCmd::new(NetworkMgmtCmdType::IsProxyActive),
            GatewayCommand::NetworkStatus => NetworkMgmtCmd::new(NetworkMgmtCmdType::NetworkStatus),
            GatewayCommand::CreateNetwork { permit_join_secs } => {
                NetworkMgmtCmd::new(NetworkMgmtCmdType::CreateNwk).with_permit_join(permit_join_secs)
            }
            GatewayCommand::PermitJoin { secs } => {
                NetworkMgmtCmd::new(NetworkMgmtCmdType::PermitJoin).with_permit_join(secs)
            }
        };
        ZigBeeMsg::network_mgmt(cmd)
    }

    /// The configuration pushed to send this command
    pub fn to_config(&self) -> DriverConfig {
        DriverConfig::zigbee(self.to_message())
    }
}

impl fmt::Display for GatewayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayCommand::ResetProxy => write!(f, "reset-proxy"),
            GatewayCommand::IsProxyActive => write!(f, "is-proxy-active"),
            GatewayCommand::NetworkStatus => write!(f, "network-status"),
            GatewayCommand::CreateNetwork { permit_join_secs } => {
                write!(f, "create-network ({}s join window)", permit_join_secs)
            }
            GatewayCommand::PermitJoin { secs } => write!(f, "permit-join ({}s)", secs),
        }
    }
}

/// Something the driver must do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayAction {
    /// Push a command to the gateway
    Send(GatewayCommand),
    /// Call [`GatewayStateMachine::on_recheck`] after the delay
    ScheduleRecheck(Duration),
    /// Add these `(node_id, endpoint_index)` pairs to the directory
    ImportDevices(Vec<(u32, u32)>),
    /// The gateway stayed inactive through every allowed reset
    ReportUnresponsive {
        /// Resets sent before giving up
        attempts: u32,
    },
}

/// Per-gateway management state machine
#[derive(Debug, Clone)]
pub struct GatewayStateMachine {
    state: GatewayState,
    reset_attempts: u32,
    max_reset_attempts: u32,
    recheck_delay: Duration,
    permit_join_secs: u32,
    history: Vec<(GatewayState, GatewayState)>,
}

impl Default for GatewayStateMachine {
    fn default() -> Self {
        Self::new(&TimingConfig::default())
    }
}

impl GatewayStateMachine {
    /// Create a machine in the `Idle` state
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            state: GatewayState::Idle,
            reset_attempts: 0,
            max_reset_attempts: timing.gateway_max_reset_attempts,
            recheck_delay: timing.gateway_recheck_delay(),
            permit_join_secs: timing.permit_join_secs,
            history: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> GatewayState {
        self.state
    }

    /// Resets sent since the gateway last reported itself active
    pub fn reset_attempts(&self) -> u32 {
        self.reset_attempts
    }

    /// Every state change so far, oldest first
    pub fn history(&self) -> &[(GatewayState, GatewayState)] {
        &self.history
    }

    fn transition(&mut self, next: GatewayState) {
        if next != self.state {
            info!("Gateway state {} -> {}", self.state, next);
            self.history.push((self.state, next));
            self.state = next;
        }
    }

    /// Process a notification from the gateway's data channel
    ///
    /// Messages whose type is not modeled are rejected with
    /// [`Error::MalformedNotification`] and leave the machine untouched.
    pub fn handle(&mut self, message: &ZigBeeMsg) -> Result<Vec<GatewayAction>> {
        match message.kind {
            ZigBeeCmdType::NetworkMgmt => match &message.network_mgmt_cmd {
                Some(cmd) => self.handle_network_mgmt(cmd),
                None => Err(Error::malformed("Network management message without payload")),
            },
            ZigBeeCmdType::Zcl => {
                debug!("Ignoring ZCL message from gateway");
                Ok(Vec::new())
            }
            ZigBeeCmdType::Unknown => Err(Error::malformed("Unmodeled ZigBee message type")),
        }
    }

    fn handle_network_mgmt(&mut self, cmd: &NetworkMgmtCmd) -> Result<Vec<GatewayAction>> {
        match cmd.kind {
            NetworkMgmtCmdType::DiscoveryInfo => Ok(self.on_discovery(cmd)),
            NetworkMgmtCmdType::IsProxyActive => Ok(self.on_proxy_active(cmd.is_proxy_active)),
            NetworkMgmtCmdType::NetworkStatus => self.on_network_status(cmd),
            NetworkMgmtCmdType::Unknown => {
                Err(Error::malformed("Unmodeled network management message"))
            }
            other => {
                debug!("Ignoring {:?} report", other);
                Ok(Vec::new())
            }
        }
    }

    fn on_discovery(&mut self, cmd: &NetworkMgmtCmd) -> Vec<GatewayAction> {
        let found = cmd.endpoints_with_cluster(ON_OFF_CLUSTER_ID);
        if found.is_empty() {
            warn!("No devices found");
            self.transition(GatewayState::Idle);
            return Vec::new();
        }

        info!("{} on/off endpoints discovered", found.len());
        self.transition(GatewayState::DevicesDiscovered);
        vec![GatewayAction::ImportDevices(found)]
    }

    fn on_proxy_active(&mut self, active: bool) -> Vec<GatewayAction> {
        if !self.state.accepts_proxy_report() {
            if self.state == GatewayState::ResettingGateway {
                info!("Gateway is already resetting");
            } else {
                debug!("Ignoring is-proxy-active report in state {}", self.state);
            }
            return Vec::new();
        }

        if active {
            info!("Gateway connected");
            self.reset_attempts = 0;
            self.transition(GatewayState::AwaitingNetworkStatus);
            return Vec::new();
        }

        if self.reset_attempts >= self.max_reset_attempts {
            warn!(
                "Gateway reset failed {} times, giving up",
                self.reset_attempts
            );
            self.transition(GatewayState::Idle);
            return vec![GatewayAction::ReportUnresponsive {
                attempts: self.reset_attempts,
            }];
        }

        self.reset_attempts += 1;
        info!(
            "Resetting gateway (attempt {} of {}), re-checking in {:?}",
            self.reset_attempts, self.max_reset_attempts, self.recheck_delay
        );
        self.transition(GatewayState::ResettingGateway);
        vec![
            GatewayAction::Send(GatewayCommand::ResetProxy),
            GatewayAction::ScheduleRecheck(self.recheck_delay),
        ]
    }

    fn on_network_status(&mut self, cmd: &NetworkMgmtCmd) -> Result<Vec<GatewayAction>> {
        let status = cmd
            .network_status
            .map(|status| status.kind)
            .unwrap_or_default();
        if status == NetworkStatusType::Unknown {
            return Err(Error::malformed("Unmodeled network status"));
        }

        if self.state != GatewayState::AwaitingNetworkStatus {
            debug!("Ignoring network status {:?} in state {}", status, self.state);
            return Ok(Vec::new());
        }

        let actions = match status {
            NetworkStatusType::NoNetwork => {
                info!("No network, creating one");
                vec![GatewayAction::Send(GatewayCommand::CreateNetwork {
                    permit_join_secs: self.permit_join_secs,
                })]
            }
            NetworkStatusType::JoinedNetwork => {
                let connected = cmd.endpoints_with_cluster(ON_OFF_CLUSTER_ID);
                info!("Network joined with {} known on/off endpoints", connected.len());
                self.transition(GatewayState::AwaitingDeviceDiscovery);
                vec![GatewayAction::ImportDevices(connected)]
            }
            NetworkStatusType::JoiningNetwork => {
                info!("Network status: joining network");
                Vec::new()
            }
            NetworkStatusType::JoinedNetworkNoParent => {
                info!("Network status: joined network without parent");
                Vec::new()
            }
            NetworkStatusType::LeavingNetwork => {
                info!("Network status: leaving network");
                Vec::new()
            }
            NetworkStatusType::Unknown => Vec::new(),
        };
        Ok(actions)
    }

    /// Process an elapsed re-check timer
    ///
    /// Returns the query to send, or nothing when the machine left
    /// `ResettingGateway` in the meantime.
    pub fn on_recheck(&mut self) -> Option<GatewayCommand> {
        if self.state != GatewayState::ResettingGateway {
            debug!("Stale re-check in state {}", self.state);
            return None;
        }
        self.transition(GatewayState::AwaitingGatewayActive);
        Some(GatewayCommand::IsProxyActive)
    }

    /// Operator request: ask whether the gateway is active
    pub fn check_gateway_active(&mut self) -> Vec<GatewayAction> {
        self.reset_attempts = 0;
        self.transition(GatewayState::AwaitingGatewayActive);
        vec![GatewayAction::Send(GatewayCommand::IsProxyActive)]
    }

    /// Operator request: ask for the network status
    pub fn request_network_status(&mut self) -> Vec<GatewayAction> {
        self.transition(GatewayState::AwaitingNetworkStatus);
        vec![GatewayAction::Send(GatewayCommand::NetworkStatus)]
    }

    /// Operator request: open a join window for new devices
    pub fn permit_join(&mut self) -> Vec<GatewayAction> {
        info!("Permitting join for {}s, reset your ZigBee devices", self.permit_join_secs);
        self.transition(GatewayState::AwaitingDeviceDiscovery);
        vec![GatewayAction::Send(GatewayCommand::PermitJoin {
            secs: self.permit_join_secs,
        })]
    }
}
