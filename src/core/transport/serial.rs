//! Serial device transport
//!
//! BlueZ exposes a bound RFCOMM channel as a tty (`rfcomm bind 0 <MAC>`
//! creates `/dev/rfcomm0`). Opening that node performs the Bluetooth
//! handshake, so it is treated as the connect step.

use super::{Connector, DeviceIdentity, Link, TransportError, TransportKind};
use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;

/// Opens tty device paths as links
#[derive(Debug, Clone)]
pub struct SerialConnector {
    baud_rate: u32,
}

impl SerialConnector {
    /// Create a serial connector with the given baud rate
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }

    /// Configured baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(115_200)
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&self, identity: &DeviceIdentity) -> Result<Link, TransportError> {
        let path = identity.address().to_string();
        let baud_rate = self.baud_rate;

        // Opening an unbound rfcomm node blocks until the remote answers.
        let port = tokio::task::spawn_blocking(move || {
            tokio_serial::new(&path, baud_rate)
                .open_native_async()
                .map_err(|e| match e.kind() {
                    tokio_serial::ErrorKind::NoDevice => TransportError::Unavailable(path.clone()),
                    _ => TransportError::ConnectFailed(e.to_string()),
                })
        })
        .await
        .map_err(|e| TransportError::ConnectFailed(e.to_string()))??;

        tracing::info!("Serial link open on {} @ {} baud", identity.address(), baud_rate);
        Ok(Link::new(port))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }
}
