/*!
 * Core data types for the MALOS client.
 *
 * Drivers are addressed by a host and a base port; every channel a driver
 * exposes lives at a fixed offset from that base port.
 */
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of consecutive ports reserved by one driver
pub const PORTS_PER_DRIVER: u16 = 4;

/// Role of a channel within a driver's port block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelRole {
    /// Configuration and command push channel (base port)
    Config,
    /// Keep-alive push channel (base port + 1)
    KeepAlive,
    /// Error subscribe channel (base port + 2)
    Error,
    /// Data subscribe channel (base port + 3)
    Data,
}

impl ChannelRole {
    /// Offset of this role from the driver's base port
    pub const fn offset(self) -> u16 {
        match self {
            ChannelRole::Config => 0,
            ChannelRole::KeepAlive => 1,
            ChannelRole::Error => 2,
            ChannelRole::Data => 3,
        }
    }

    /// Short name used in logs
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelRole::Config => "config",
            ChannelRole::KeepAlive => "keep-alive",
            ChannelRole::Error => "error",
            ChannelRole::Data => "data",
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network address of a driver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverAddress {
    /// Host running the MALOS daemon
    pub host: String,
    /// Port of the configuration channel
    pub base_port: u16,
}

impl DriverAddress {
    /// Create a new driver address
    pub fn new<S: Into<String>>(host: S, base_port: u16) -> Self {
        Self {
            host: host.into(),
            base_port,
        }
    }

    /// Port of the channel with the given role
    ///
    /// Fails when the port block would run past `u16::MAX`.
    pub fn port(&self, role: ChannelRole) -> Result<u16> {
        self.base_port.checked_add(role.offset()).ok_or_else(|| {
            Error::config(format!(
                "Port block of base port {} overflows for the {} channel",
                self.base_port, role
            ))
        })
    }

    /// Endpoint URL of the channel with the given role
    pub fn endpoint(&self, role: ChannelRole) -> Result<Endpoint> {
        Ok(Endpoint::tcp(&self.host, self.port(role)?))
    }

    /// Whether the port blocks of two addresses on the same host overlap
    pub fn overlaps(&self, other: &DriverAddress) -> bool {
        if self.host != other.host {
            return false;
        }
        let a = u32::from(self.base_port);
        let b = u32::from(other.base_port);
        let span = u32::from(PORTS_PER_DRIVER);
        a < b + span && b < a + span
    }
}

impl fmt::Display for DriverAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.base_port)
    }
}

/// A transport endpoint URL such as `tcp://127.0.0.1:40001`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint(String);

impl Endpoint {
    /// Create a TCP endpoint
    pub fn tcp(host: &str, port: u16) -> Self {
        Self(format!("tcp://{}:{}", host, port))
    }

    /// Get the URL
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The closed set of driver types this client knows how to configure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Humidity and temperature sensor
    Humidity,
    /// Ultraviolet light sensor
    Uv,
    /// LED ring
    Everloop,
    /// ZigBee gateway
    Zigbee,
}

impl DriverKind {
    /// Every known driver kind
    pub const ALL: [DriverKind; 4] = [
        DriverKind::Humidity,
        DriverKind::Uv,
        DriverKind::Everloop,
        DriverKind::Zigbee,
    ];

    /// The name used in configuration files
    pub const fn as_str(self) -> &'static str {
        match self {
            DriverKind::Humidity => "humidity",
            DriverKind::Uv => "uv",
            DriverKind::Everloop => "everloop",
            DriverKind::Zigbee => "zigbee",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DriverKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::unknown_driver(s))
    }
}

/// A driver declared by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverDescriptor {
    /// Driver name, which selects the behavior
    pub name: String,
    /// Driver address
    pub address: DriverAddress,
}

impl DriverDescriptor {
    /// Create a new descriptor
    pub fn new<S: Into<String>>(name: S, address: DriverAddress) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    /// Resolve the driver kind named by this descriptor
    pub fn kind(&self) -> Result<DriverKind> {
        self.name.parse()
    }
}

impl fmt::Display for DriverDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}
