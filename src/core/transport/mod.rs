//! Transport layer for the remote console link
//!
//! The byte stream itself is supplied by the platform. This module only
//! adapts the available ones to a common shape:
//! - RFCOMM tty devices (`/dev/rfcomm0`) through the serial driver
//! - Raw TCP (serial-over-TCP bridges)
//! - Native RFCOMM sockets (Linux, `rfcomm` feature)

#[cfg(all(target_os = "linux", feature = "rfcomm"))]
mod rfcomm;
mod serial;
mod tcp;

#[cfg(all(target_os = "linux", feature = "rfcomm"))]
pub use rfcomm::RfcommConnector;
pub use serial::SerialConnector;
pub use tcp::TcpConnector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// RFCOMM tty device opened as a serial port
    #[default]
    Serial,
    /// Raw TCP
    Tcp,
    /// Native RFCOMM socket
    Rfcomm,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Tcp => write!(f, "TCP"),
            Self::Rfcomm => write!(f, "RFCOMM"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// No adapter, no device node, or the transport was not compiled in
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// Handshake with the remote device failed
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Read or write failed mid-session
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Connection timeout
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Address could not be parsed for the selected transport
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The remote endpoint of a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    address: String,
    display_name: Option<String>,
}

impl DeviceIdentity {
    /// Identity without a display name
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }

    /// Set the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Transport address (MAC, tty path or `host:port`)
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Display name, falling back to the address
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.address)
    }
}

/// Read half of an open link
pub type LinkReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write half of an open link
pub type LinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open, reliable, ordered byte stream to one remote endpoint.
///
/// Dropping both halves closes the underlying transport.
pub struct Link {
    /// Incoming bytes
    pub reader: LinkReader,
    /// Outgoing bytes
    pub writer: LinkWriter,
}

impl Link {
    /// Split a bidirectional stream into a link
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Build a link from separately owned halves
    pub fn from_halves(reader: LinkReader, writer: LinkWriter) -> Self {
        Self { reader, writer }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens links to remote devices.
///
/// `connect` may block for the whole handshake; callers run it on its own
/// task and cancel it by dropping the future.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link to the device
    async fn connect(&self, identity: &DeviceIdentity) -> Result<Link, TransportError>;

    /// Get transport type
    fn kind(&self) -> TransportKind;
}

/// Adapter settings shared by all transports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Which adapter to use
    pub kind: TransportKind,
    /// Baud rate for tty devices
    pub baud_rate: u32,
    /// Handshake timeout in seconds
    pub connect_timeout_secs: u64,
    /// RFCOMM channel when the address does not name one
    pub rfcomm_channel: u8,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::Serial,
            baud_rate: 115_200,
            connect_timeout_secs: 10,
            rfcomm_channel: 1,
        }
    }
}

/// Create a connector for the configured transport
pub fn create_connector(settings: &TransportSettings) -> Result<Box<dyn Connector>, TransportError> {
    match settings.kind {
        TransportKind::Serial => Ok(Box::new(SerialConnector::new(settings.baud_rate))),
        TransportKind::Tcp => Ok(Box::new(TcpConnector::new(settings.connect_timeout_secs))),
        #[cfg(all(target_os = "linux", feature = "rfcomm"))]
        TransportKind::Rfcomm => Ok(Box::new(RfcommConnector::new(
            settings.rfcomm_channel,
            settings.connect_timeout_secs,
        ))),
        #[cfg(not(all(target_os = "linux", feature = "rfcomm")))]
        TransportKind::Rfcomm => Err(TransportError::Unavailable(
            "native RFCOMM sockets need Linux and the `rfcomm` feature".to_string(),
        )),
    }
}
