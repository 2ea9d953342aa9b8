/*!
 * Proxy for a discovered ZigBee light.
 *
 * Every action sends exactly one ZCL command addressed to the device's node
 * and endpoint on the gateway's config channel. The cached state is updated
 * before sending; nothing is read back from the device.
 */
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use malos_core::error::{Error, Result};
use malos_devices::driver::ConfigPusher;
use malos_devices::messages::{DriverConfig, OnOffCmdType, ZclCmd, ZigBeeMsg};

/// Brightness assumed before any level command
pub const DEFAULT_BRIGHTNESS: u8 = 50;

/// Color temperature in mireds assumed before any color command
pub const DEFAULT_COLOR_TEMPERATURE: u16 = 340;

/// Highest brightness level the level cluster accepts
pub const MAX_BRIGHTNESS: u8 = 254;

/// Transition time of level and color commands, in tenths of a second
pub const TRANSITION_TIME: u32 = 10;

/// Last state this client asked the device to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedState {
    /// On/off state, unknown until the first on/off command
    pub on: Option<bool>,
    /// Brightness level
    pub brightness: u8,
    /// Color temperature in mireds
    pub color_temperature: u16,
}

impl Default for CachedState {
    fn default() -> Self {
        Self {
            on: None,
            brightness: DEFAULT_BRIGHTNESS,
            color_temperature: DEFAULT_COLOR_TEMPERATURE,
        }
    }
}

/// A controllable device behind the gateway
#[derive(Debug)]
pub struct ZigbeeDevice {
    node_id: u32,
    endpoint_index: u32,
    pusher: ConfigPusher,
    cache: Mutex<CachedState>,
}

impl ZigbeeDevice {
    pub(crate) fn new(node_id: u32, endpoint_index: u32, pusher: ConfigPusher) -> Self {
        Self {
            node_id,
            endpoint_index,
            pusher,
            cache: Mutex::new(CachedState::default()),
        }
    }

    /// Mesh node identifier
    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Endpoint index on the node
    pub fn endpoint_index(&self) -> u32 {
        self.endpoint_index
    }

    /// Display name of the device
    pub fn name(&self) -> String {
        self.node_id.to_string()
    }

    fn cache(&self) -> MutexGuard<'_, CachedState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the cached state
    pub fn cached(&self) -> CachedState {
        *self.cache()
    }

    /// Cached on/off state
    pub fn is_on(&self) -> Option<bool> {
        self.cache().on
    }

    /// Cached brightness
    pub fn brightness(&self) -> u8 {
        self.cache().brightness
    }

    /// Cached color temperature
    pub fn color_temperature(&self) -> u16 {
        self.cache().color_temperature
    }

    /// Switch the device on
    pub async fn turn_on(&self) -> Result<()> {
        self.cache().on = Some(true);
        self.on_off(OnOffCmdType::On).await
    }

    /// Switch the device off
    pub async fn turn_off(&self) -> Result<()> {
        self.cache().on = Some(false);
        self.on_off(OnOffCmdType::Off).await
    }

    /// Flip the device's on/off state
    pub async fn toggle(&self) -> Result<()> {
        {
            let mut cache = self.cache();
            cache.on = cache.on.map(|on| !on);
        }
        self.on_off(OnOffCmdType::Toggle).await
    }

    /// Move to a brightness level between 0 and [`MAX_BRIGHTNESS`]
    pub async fn set_brightness(&self, level: u8) -> Result<()> {
        if level > MAX_BRIGHTNESS {
            return Err(Error::invalid_argument(format!(
                "Brightness {} above {}",
                level, MAX_BRIGHTNESS
            )));
        }
        self.cache().brightness = level;
        self.send(ZclCmd::move_to_level(
            self.node_id,
            self.endpoint_index,
            u32::from(level),
            TRANSITION_TIME,
        ))
        .await
    }

    /// Move to a color temperature in mireds
    pub async fn set_color_temperature(&self, mireds: u16) -> Result<()> {
        self.cache().color_temperature = mireds;
        self.send(ZclCmd::move_to_color_temp(
            self.node_id,
            self.endpoint_index,
            u32::from(mireds),
            TRANSITION_TIME,
        ))
        .await
    }

    async fn on_off(&self, kind: OnOffCmdType) -> Result<()> {
        self.send(ZclCmd::on_off(self.node_id, self.endpoint_index, kind))
            .await
    }

    async fn send(&self, cmd: ZclCmd) -> Result<()> {
        debug!(
            "Sending {:?} to node {} endpoint {}",
            cmd.kind, self.node_id, self.endpoint_index
        );
        self.pusher
            .push(&DriverConfig::zigbee(ZigBeeMsg::zcl(cmd)))
            .await
    }
}
