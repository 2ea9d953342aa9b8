/*!
 * Gateway management states.
 */
use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the negotiation with the ZigBee gateway stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayState {
    /// Nothing in progress
    #[default]
    Idle,
    /// A proxy reset was sent and a re-check is pending
    ResettingGateway,
    /// Waiting for the answer to an is-proxy-active query
    AwaitingGatewayActive,
    /// The gateway is active; waiting for a network status report
    AwaitingNetworkStatus,
    /// The network is up; waiting for devices to be reported
    AwaitingDeviceDiscovery,
    /// At least one controllable device was reported
    DevicesDiscovered,
}

impl GatewayState {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Idle => "idle",
            GatewayState::ResettingGateway => "resetting-gateway",
            GatewayState::AwaitingGatewayActive => "awaiting-gateway-active",
            GatewayState::AwaitingNetworkStatus => "awaiting-network-status",
            GatewayState::AwaitingDeviceDiscovery => "awaiting-device-discovery",
            GatewayState::DevicesDiscovered => "devices-discovered",
        }
    }

    /// Whether an is-proxy-active report is acted upon in this state
    pub fn accepts_proxy_report(&self) -> bool {
        matches!(
            self,
            GatewayState::Idle | GatewayState::AwaitingGatewayActive
        )
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
