/*!
 * Error types for the MALOS client.
 *
 * A single error enum is shared by every crate of the workspace so that a
 * failure raised deep inside a channel lane can be reported unchanged by the
 * client that started it.
 */
use thiserror::Error;

/// Error type for MALOS client operations
#[derive(Error, Debug)]
pub enum Error {
    /// The descriptor names a driver with no registered behavior
    #[error("Unknown driver type: {0}")]
    UnknownDriverType(String),

    /// A channel could not be opened
    #[error("Failed to open channel {endpoint}: {reason}")]
    ChannelOpen {
        /// Endpoint URL of the channel
        endpoint: String,
        /// Transport-level reason
        reason: String,
    },

    /// A message could not be written to a channel
    #[error("Failed to send on channel {endpoint}: {reason}")]
    ChannelSend {
        /// Endpoint URL of the channel
        endpoint: String,
        /// Transport-level reason
        reason: String,
    },

    /// A message could not be read from a channel
    #[error("Failed to receive on channel {endpoint}: {reason}")]
    ChannelReceive {
        /// Endpoint URL of the channel
        endpoint: String,
        /// Transport-level reason
        reason: String,
    },

    /// A received notification failed to decode or is not modeled
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// The gateway never reported itself active after repeated resets
    #[error("Gateway unresponsive after {attempts} reset attempts")]
    GatewayUnresponsive {
        /// Number of resets sent before giving up
        attempts: u32,
    },

    /// A device command addressed a device missing from the directory
    #[error("No device at node {node_id} endpoint {endpoint_index}")]
    InvalidCommandTarget {
        /// Mesh node identifier
        node_id: u32,
        /// Endpoint index on the node
        endpoint_index: u32,
    },

    /// An argument was outside its accepted range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Encoding or decoding error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for MALOS client operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new unknown driver type error
    pub fn unknown_driver<S: AsRef<str>>(name: S) -> Self {
        Error::UnknownDriverType(name.as_ref().to_string())
    }

    /// Create a new channel open error
    pub fn channel_open<E: AsRef<str>, R: ToString>(endpoint: E, reason: R) -> Self {
        Error::ChannelOpen {
            endpoint: endpoint.as_ref().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new channel send error
    pub fn channel_send<E: AsRef<str>, R: ToString>(endpoint: E, reason: R) -> Self {
        Error::ChannelSend {
            endpoint: endpoint.as_ref().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new channel receive error
    pub fn channel_receive<E: AsRef<str>, R: ToString>(endpoint: E, reason: R) -> Self {
        Error::ChannelReceive {
            endpoint: endpoint.as_ref().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new malformed notification error
    pub fn malformed<S: AsRef<str>>(msg: S) -> Self {
        Error::MalformedNotification(msg.as_ref().to_string())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: AsRef<str>>(msg: S) -> Self {
        Error::InvalidArgument(msg.as_ref().to_string())
    }

    /// Create a new codec error
    pub fn codec<S: AsRef<str>>(msg: S) -> Self {
        Error::Codec(msg.as_ref().to_string())
    }

    /// Create a new configuration error
    pub fn config<S: AsRef<str>>(msg: S) -> Self {
        Error::Config(msg.as_ref().to_string())
    }

    /// Create a new runtime error
    pub fn runtime<S: AsRef<str>>(msg: S) -> Self {
        Error::Runtime(msg.as_ref().to_string())
    }

    /// Create a new timeout error
    pub fn timeout<S: AsRef<str>>(msg: S) -> Self {
        Error::Timeout(msg.as_ref().to_string())
    }

    /// Create a new other error
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        Error::Other(msg.as_ref().to_string())
    }

    /// Whether the error only concerns a single message and the lane that
    /// produced it can keep running
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Error::MalformedNotification(_) | Error::Codec(_) | Error::InvalidArgument(_)
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_endpoint() {
        let err = Error::channel_open("tcp://127.0.0.1:40001", "connection refused");
        assert_eq!(
            err.to_string(),
            "Failed to open channel tcp://127.0.0.1:40001: connection refused"
        );
    }

    #[test]
    fn test_invalid_command_target_display() {
        let err = Error::InvalidCommandTarget {
            node_id: 7,
            endpoint_index: 1,
        };
        assert_eq!(err.to_string(), "No device at node 7 endpoint 1");
    }

    #[test]
    fn test_per_message_classification() {
        assert!(Error::malformed("bad frame").is_per_message());
        assert!(Error::codec("eof").is_per_message());
        assert!(!Error::channel_receive("tcp://h:1", "closed").is_per_message());
        assert!(!Error::GatewayUnresponsive { attempts: 5 }.is_per_message());
    }
}
