//! TCP transport implementation

use super::{Connector, DeviceIdentity, Link, TransportError, TransportKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Connects to `host:port` addresses, e.g. a serial-over-TCP bridge in
/// front of the console.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout_secs: u64,
}

impl TcpConnector {
    /// Create a new TCP connector
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, identity: &DeviceIdentity) -> Result<Link, TransportError> {
        let addr = identity.address();
        if !addr.contains(':') {
            return Err(TransportError::InvalidAddress(addr.to_string()));
        }

        let stream = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            TcpStream::connect(addr),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.timeout_secs))?
        .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        // Set TCP_NODELAY for lower latency
        stream.set_nodelay(true).map_err(TransportError::Io)?;

        tracing::info!("TCP link open to {}", addr);
        let (reader, writer) = stream.into_split();
        Ok(Link::from_halves(Box::new(reader), Box::new(writer)))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }
}
