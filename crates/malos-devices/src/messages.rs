/*!
 * MALOS message shapes.
 *
 * These mirror the driver configuration, ZigBee and sensor messages exchanged
 * with the MALOS daemon. Enum values use the daemon's upper snake case names;
 * values this client does not model decode to an `Unknown` variant.
 */
use serde::{Deserialize, Serialize};

/// Cluster id of the ZigBee on/off cluster
pub const ON_OFF_CLUSTER_ID: u32 = 6;

/// Configuration pushed to a driver on its config channel
///
/// Also carries every command sent to the ZigBee gateway and the LED image of
/// the everloop ring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Seconds between two data updates from the driver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_between_updates: Option<f32>,
    /// Seconds the driver keeps publishing after the last keep-alive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_after_last_ping: Option<f32>,
    /// Humidity sensor parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<HumidityParams>,
    /// LED ring image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EverloopImage>,
    /// ZigBee gateway command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zigbee_message: Option<ZigBeeMsg>,
}

impl DriverConfig {
    /// Configuration with only the update timing set
    pub fn with_timing(delay_between_updates: f32, timeout_after_last_ping: f32) -> Self {
        Self {
            delay_between_updates: Some(delay_between_updates),
            timeout_after_last_ping: Some(timeout_after_last_ping),
            ..Default::default()
        }
    }

    /// Configuration carrying a ZigBee command
    pub fn zigbee(message: ZigBeeMsg) -> Self {
        Self {
            zigbee_message: Some(message),
            ..Default::default()
        }
    }

    /// Configuration carrying an LED image
    pub fn image(led: Vec<LedValue>) -> Self {
        Self {
            image: Some(EverloopImage { led }),
            ..Default::default()
        }
    }
}

/// Humidity sensor calibration parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumidityParams {
    /// Ambient temperature used for calibration, in degrees Celsius
    pub current_temperature: f32,
}

/// Image shown on the LED ring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EverloopImage {
    /// One value per LED, in ring order
    pub led: Vec<LedValue>,
}

/// Color of a single LED
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LedValue {
    #[allow(missing_docs)]
    pub red: u32,
    #[allow(missing_docs)]
    pub green: u32,
    #[allow(missing_docs)]
    pub blue: u32,
    #[allow(missing_docs)]
    pub white: u32,
}

impl LedValue {
    /// Create a new LED value
    pub const fn new(red: u32, green: u32, blue: u32, white: u32) -> Self {
        Self {
            red,
            green,
            blue,
            white,
        }
    }

    /// An LED that is switched off
    pub const OFF: LedValue = LedValue::new(0, 0, 0, 0);
}

/// A message to or from the ZigBee gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZigBeeMsg {
    /// Command family
    #[serde(rename = "type")]
    pub kind: ZigBeeCmdType,
    /// Network management payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mgmt_cmd: Option<NetworkMgmtCmd>,
    /// ZigBee cluster library payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zcl_cmd: Option<ZclCmd>,
}

impl ZigBeeMsg {
    /// A network management message
    pub fn network_mgmt(cmd: NetworkMgmtCmd) -> Self {
        Self {
            kind: ZigBeeCmdType::NetworkMgmt,
            network_mgmt_cmd: Some(cmd),
            zcl_cmd: None,
        }
    }

    /// A cluster library command
    pub fn zcl(cmd: ZclCmd) -> Self {
        Self {
            kind: ZigBeeCmdType::Zcl,
            network_mgmt_cmd: None,
            zcl_cmd: Some(cmd),
        }
    }
}

/// Command family of a ZigBee message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZigBeeCmdType {
    /// ZigBee cluster library command
    Zcl,
    /// Network management command or report
    NetworkMgmt,
    /// Not modeled by this client
    #[default]
    #[serde(other)]
    Unknown,
}

/// Network management command or report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkMgmtCmd {
    /// Command or report type
    #[serde(rename = "type")]
    pub kind: NetworkMgmtCmdType,
    /// Whether the gateway proxy is running (is-proxy-active reports)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_proxy_active: bool,
    /// Network status (network-status reports)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_status: Option<NetworkStatus>,
    /// Join window parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_join_params: Option<PermitJoinParams>,
    /// Nodes known to the gateway (discovery and network-status reports)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connected_nodes: Vec<ConnectedNode>,
}

impl NetworkMgmtCmd {
    /// A bare command of the given type
    pub fn new(kind: NetworkMgmtCmdType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Attach a join window, in seconds
    pub fn with_permit_join(mut self, time: u32) -> Self {
        self.permit_join_params = Some(PermitJoinParams { time });
        self
    }

    /// Every `(node_id, endpoint_index)` pair exposing the given cluster, in
    /// report order
    pub fn endpoints_with_cluster(&self, cluster_id: u32) -> Vec<(u32, u32)> {
        self.connected_nodes
            .iter()
            .flat_map(|node| {
                node.endpoints
                    .iter()
                    .filter(|endpoint| {
                        endpoint
                            .clusters
                            .iter()
                            .any(|cluster| cluster.cluster_id == cluster_id)
                    })
                    .map(move |endpoint| (node.node_id, endpoint.endpoint_index))
            })
            .collect()
    }
}

/// Network management command types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkMgmtCmdType {
    /// Create a new network
    CreateNwk,
    /// Open a join window
    PermitJoin,
    /// Report of the devices on the network
    DiscoveryInfo,
    /// Restart the gateway proxy
    ResetProxy,
    /// Ask or report whether the gateway proxy is running
    IsProxyActive,
    /// Ask or report the network status
    NetworkStatus,
    /// Not modeled by this client
    #[default]
    #[serde(other)]
    Unknown,
}

/// Network status report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkStatus {
    #[allow(missing_docs)]
    #[serde(rename = "type")]
    pub kind: NetworkStatusType,
}

/// Status of the ZigBee network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkStatusType {
    #[allow(missing_docs)]
    NoNetwork,
    #[allow(missing_docs)]
    JoiningNetwork,
    #[allow(missing_docs)]
    JoinedNetwork,
    #[allow(missing_docs)]
    JoinedNetworkNoParent,
    #[allow(missing_docs)]
    LeavingNetwork,
    /// Not modeled by this client
    #[default]
    #[serde(other)]
    Unknown,
}

/// Join window parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermitJoinParams {
    /// Window length in seconds
    pub time: u32,
}

/// A node reported by the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectedNode {
    #[allow(missing_docs)]
    pub node_id: u32,
    #[allow(missing_docs)]
    pub endpoints: Vec<NodeEndpoint>,
}

/// An addressable endpoint of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeEndpoint {
    #[allow(missing_docs)]
    pub endpoint_index: u32,
    #[allow(missing_docs)]
    pub clusters: Vec<Cluster>,
}

/// A cluster supported by an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    #[allow(missing_docs)]
    pub cluster_id: u32,
}

/// ZigBee cluster library command addressed to one endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZclCmd {
    /// Cluster the command belongs to
    #[serde(rename = "type")]
    pub kind: ZclCmdType,
    /// Target node
    pub node_id: u32,
    /// Target endpoint on the node
    pub endpoint_index: u32,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onoff_cmd: Option<OnOffCmd>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_cmd: Option<LevelCmd>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorcontrol_cmd: Option<ColorControlCmd>,
}

impl ZclCmd {
    fn addressed(kind: ZclCmdType, node_id: u32, endpoint_index: u32) -> Self {
        Self {
            kind,
            node_id,
            endpoint_index,
            ..Default::default()
        }
    }

    /// On/off cluster command
    pub fn on_off(node_id: u32, endpoint_index: u32, kind: OnOffCmdType) -> Self {
        Self {
            onoff_cmd: Some(OnOffCmd { kind }),
            ..Self::addressed(ZclCmdType::OnOff, node_id, endpoint_index)
        }
    }

    /// Level cluster move-to-level command
    pub fn move_to_level(node_id: u32, endpoint_index: u32, level: u32, transition_time: u32) -> Self {
        Self {
            level_cmd: Some(LevelCmd {
                kind: LevelCmdType::MoveToLevel,
                move_to_level_params: Some(MoveToLevelParams {
                    level,
                    transition_time,
                }),
            }),
            ..Self::addressed(ZclCmdType::Level, node_id, endpoint_index)
        }
    }

    /// Color control move-to-color-temperature command
    pub fn move_to_color_temp(
        node_id: u32,
        endpoint_index: u32,
        color_temperature: u32,
        transition_time: u32,
    ) -> Self {
        Self {
            colorcontrol_cmd: Some(ColorControlCmd {
                kind: ColorControlCmdType::MoveToColorTemp,
                movetocolortemp_params: Some(MoveToColorTempParams {
                    color_temperature,
                    transition_time,
                }),
            }),
            ..Self::addressed(ZclCmdType::ColorControl, node_id, endpoint_index)
        }
    }
}

/// Cluster of a ZCL command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZclCmdType {
    #[allow(missing_docs)]
    OnOff,
    #[allow(missing_docs)]
    Level,
    #[allow(missing_docs)]
    ColorControl,
    /// Not modeled by this client
    #[default]
    #[serde(other)]
    Unknown,
}

/// On/off cluster command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnOffCmd {
    #[allow(missing_docs)]
    #[serde(rename = "type")]
    pub kind: OnOffCmdType,
}

/// On/off cluster command types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnOffCmdType {
    #[allow(missing_docs)]
    On,
    #[allow(missing_docs)]
    Off,
    #[allow(missing_docs)]
    Toggle,
    /// Not modeled by this client
    #[default]
    #[serde(other)]
    Unknown,
}

/// Level cluster command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCmd {
    #[allow(missing_docs)]
    #[serde(rename = "type")]
    pub kind: LevelCmdType,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_to_level_params: Option<MoveToLevelParams>,
}

/// Level cluster command types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelCmdType {
    #[allow(missing_docs)]
    MoveToLevel,
    /// Not modeled by this client
    #[default]
    #[serde(other)]
    Unknown,
}

/// Move-to-level parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveToLevelParams {
    /// Target level, 0 to 254
    pub level: u32,
    /// Transition time in tenths of a second
    pub transition_time: u32,
}

/// Color control cluster command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorControlCmd {
    #[allow(missing_docs)]
    #[serde(rename = "type")]
    pub kind: ColorControlCmdType,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movetocolortemp_params: Option<MoveToColorTempParams>,
}

/// Color control cluster command types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorControlCmdType {
    #[allow(missing_docs)]
    #[serde(rename = "MOVETOCOLORTEMP")]
    MoveToColorTemp,
    /// Not modeled by this client
    #[default]
    #[serde(other)]
    Unknown,
}

/// Move-to-color-temperature parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveToColorTempParams {
    /// Color temperature in mireds
    pub color_temperature: u32,
    /// Transition time in tenths of a second
    pub transition_time: u32,
}

/// Humidity sensor reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Humidity {
    /// Relative humidity in percent
    pub humidity: f32,
    /// Calibrated temperature in degrees Celsius
    pub temperature: f32,
    /// Raw sensor temperature
    pub temperature_raw: f32,
    #[allow(missing_docs)]
    pub temperature_is_calibrated: bool,
}

/// Ultraviolet sensor reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Uv {
    #[allow(missing_docs)]
    pub uv_index: f32,
    /// Risk level label reported by the sensor
    pub oms_risk: String,
}
